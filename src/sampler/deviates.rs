//! Gamma and Normal deviates with sentinel fallbacks instead of errors.

use rand::Rng;
use rand_distr::{Distribution, Gamma, Normal};

/// Draw from Gamma(shape, rate).
///
/// Invalid parameters fall back to the distribution mean `shape / rate`,
/// kept strictly positive.
pub fn gamma<R: Rng + ?Sized>(rng: &mut R, shape: f64, rate: f64) -> f64 {
    match Gamma::new(shape, 1.0 / rate) {
        Ok(dist) => dist.sample(rng),
        Err(e) => {
            log::warn!("Gamma({}, {}) is degenerate ({}), using its mean", shape, rate, e);
            (shape / rate).max(f64::MIN_POSITIVE)
        }
    }
}

/// Draw from Normal(mean, std_dev); a degenerate spread returns `mean`.
pub fn normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    match Normal::new(mean, std_dev) {
        Ok(dist) => dist.sample(rng),
        Err(_) => mean,
    }
}

/// Normalised vector of independent Gamma(prior_i + count_i, 1) draws.
pub fn dirichlet<R: Rng + ?Sized>(rng: &mut R, counts: &[f64], prior: &[f64]) -> Vec<f64> {
    let portions: Vec<f64> = counts
        .iter()
        .zip(prior)
        .map(|(&c, &a)| gamma(rng, a + c, 1.0))
        .collect();
    let total: f64 = portions.iter().sum();
    if total > 0.0 && total.is_finite() {
        portions.into_iter().map(|p| p / total).collect()
    } else {
        let n = portions.len().max(1) as f64;
        vec![1.0 / n; portions.len()]
    }
}
