//! Blocked Gibbs moves over the corpus.
//!
//! The [`Sampler`] owns the random stream and the prior; the corpus it
//! operates on is always passed in explicitly.

pub mod assign;
pub mod boundary;
pub mod categorical;
pub mod deviates;
pub mod params;

pub use assign::{Assignment, ClusterChoice};
pub use boundary::{MoveOutcome, Site};
pub use categorical::{sample_index_from_distribution, sample_index_from_log_distribution, sum_logs};
pub use params::SufficientStats;

use crate::config::PriorConfig;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub struct Sampler {
    prior: PriorConfig,
    rng: ChaCha8Rng,
    /// `[P(no boundary), P(boundary)]`.
    boundary_prior: [f64; 2],
    boundary_prior_log: [f64; 2],
}

impl Sampler {
    /// Create a sampler. Without a seed the stream is seeded from the OS.
    pub fn new(prior: PriorConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };
        let boundary_prior = [prior.h0, 1.0 - prior.h0];
        let boundary_prior_log = [boundary_prior[0].ln(), boundary_prior[1].ln()];
        Self {
            prior,
            rng,
            boundary_prior,
            boundary_prior_log,
        }
    }

    pub fn prior(&self) -> &PriorConfig {
        &self.prior
    }

    /// Uniform draw from the open interval (0, 1).
    pub fn sample_from_unit(&mut self) -> f64 {
        loop {
            let u: f64 = self.rng.random();
            if u > 0.0 && u < 1.0 {
                return u;
            }
        }
    }
}
