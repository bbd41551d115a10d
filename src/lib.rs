//! dpseg - unsupervised acoustic unit discovery
//!
//! A Dirichlet-process mixture of left-to-right HMMs over a Bayesian
//! segmentation of feature streams, inferred by blocked Gibbs sampling.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod io;
pub mod manager;
pub mod model;
pub mod sampler;

// Error handling
pub use error::{DpsegError, Result};

// Config
pub use config::{Config, PriorConfig, TrainingConfig};

// Model state
pub use model::{Bound, BoundId, Cluster, ClusterId, Corpus, Segment, SegmentId};

// Inference
pub use manager::Manager;
pub use sampler::Sampler;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
