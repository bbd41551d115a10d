//! Default configuration constants for dpseg.
//!
//! Shared by the TOML and legacy configuration readers and by the sampler,
//! so both formats start from the same prior.

/// Default feature vector dimension (MFCC + deltas in the usual setup).
pub const DIM: usize = 64;

/// Default number of emitting states per cluster HMM.
pub const STATE_NUM: usize = 3;

/// Default Dirichlet-process concentration.
pub const DP_ALPHA: f64 = 1.0;

/// Default Beta prior parameters for boundaries.
///
/// Accepted for compatibility with existing configuration files; the
/// boundary draw itself uses [`H0`].
pub const BETA_ALPHA: f64 = 5.0;
pub const BETA_BETA: f64 = 5.0;

/// Default shape of the Gamma prior on emission precisions.
pub const GAMMA_SHAPE: f64 = 3.0;

/// Default rate of the Gamma prior on emission precisions.
pub const GAMMA_RATE: f64 = 1.0;

/// Default pseudo-count of the Normal prior on emission means.
pub const NORM_KAPPA: f64 = 5.0;

/// Default prior mean of the emission means.
pub const NORM_MU0: f64 = 0.0;

/// Default Gamma shape for mixture weights (kept for configuration compatibility).
pub const GAMMA_WEIGHT_ALPHA: f64 = 3.0;

/// Default Gamma pseudo-count for each reachable transition.
pub const GAMMA_TRANS_ALPHA: f64 = 3.0;

/// Default prior probability that a candidate site is NOT a boundary.
pub const H0: f64 = 0.5;

/// Default number of outer Gibbs sweeps.
pub const ITERATIONS: usize = 1000;

/// Default number of input files per batch group.
pub const GROUP_SIZE: usize = 1;

/// Sweeps between label/snapshot dumps.
pub const SNAPSHOT_INTERVAL: usize = 100;

/// Sweeps between cluster pruning passes.
pub const PRUNE_INTERVAL: usize = 100;

/// Minimum age (in sweeps) before a cluster can be pruned.
pub const PRUNE_MIN_AGE: u64 = 500;

/// Clusters with at most this many members are pruning candidates.
pub const PRUNE_MAX_MEMBERS: usize = 1;

/// Input files between cluster refreshes while loading.
pub const LOAD_REFRESH_INTERVAL: usize = 100;

/// Log-prior assigned to a cluster with no members instead of `ln(0)`.
pub const ZERO_MEMBER_LOG_PRIOR: f64 = -300.0;

/// Multiplier on the transition pseudo-count for the favoured entries of
/// the first two states.
pub const TRANS_PRIOR_BOOST: f64 = 3.0;

/// Whether the first state may skip ahead and exit directly.
pub const SKIP: bool = true;

/// Multiplier on the second state's self-loop pseudo-count when skipping
/// is disabled.
pub const ADJACENT_LOOP_BOOST: f64 = 5.0;

/// Cluster label that marks an unlabeled bound in a labeled index file.
pub const UNLABELED: i64 = -1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_prior_is_a_probability() {
        assert!((0.0..=1.0).contains(&H0));
    }

    #[test]
    fn zero_member_prior_is_far_below_any_real_prior() {
        // One member out of a million segments is still far above the sentinel.
        assert!((1.0f64 / 1.0e6).ln() > ZERO_MEMBER_LOG_PRIOR);
    }
}
