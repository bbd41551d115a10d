//! Conjugate resampling of one cluster's HMM parameters.
//!
//! Emissions use a Normal-Gamma prior per dimension, transitions a
//! Dirichlet over the reachable entries of each row. Statistics come from
//! the Viterbi paths stored on the member segments.

use super::Sampler;
use super::deviates::{dirichlet, gamma, normal};
use crate::defaults::{ADJACENT_LOOP_BOOST, TRANS_PRIOR_BOOST};
use crate::model::{Cluster, ClusterId, Corpus, FrameStore, is_adjacent, is_reachable};

/// Per-state frame statistics and transition counts for one cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct SufficientStats {
    pub frame_counts: Vec<f64>,
    pub sums: Vec<Vec<f64>>,
    pub sum_squares: Vec<Vec<f64>>,
    /// `state_num × (state_num + 1)`; the last column counts exits.
    pub trans_counts: Vec<Vec<f64>>,
}

impl SufficientStats {
    pub fn new(state_num: usize, dim: usize) -> Self {
        Self {
            frame_counts: vec![0.0; state_num],
            sums: vec![vec![0.0; dim]; state_num],
            sum_squares: vec![vec![0.0; dim]; state_num],
            trans_counts: vec![vec![0.0; state_num + 1]; state_num],
        }
    }

    /// Add one decoded frame sequence.
    pub fn accumulate(&mut self, store: &FrameStore, frames: &[usize], states: &[usize]) {
        for (&f, &s) in frames.iter().zip(states) {
            self.frame_counts[s] += 1.0;
            for (d, &x) in store.frame(f).iter().enumerate() {
                let x = x as f64;
                self.sums[s][d] += x;
                self.sum_squares[s][d] += x * x;
            }
        }
        for pair in states.windows(2) {
            self.trans_counts[pair[0]][pair[1]] += 1.0;
        }
        if let Some(&last) = states.last() {
            let exit = self.trans_counts[last].len() - 1;
            self.trans_counts[last][exit] += 1.0;
        }
    }

    /// Statistics over every member of `cluster`.
    pub fn collect(corpus: &Corpus, cluster: &Cluster) -> Self {
        let mut stats = Self::new(cluster.state_num(), cluster.dim());
        for &member in cluster.members() {
            let Some(segment) = corpus.segments.get(member) else {
                continue;
            };
            let frames = corpus.segment_frames(segment);
            if segment.states.len() != frames.len() {
                log::debug!(
                    "Skipping {} in cluster statistics: {} states for {} frames",
                    segment.tag,
                    segment.states.len(),
                    frames.len()
                );
                continue;
            }
            stats.accumulate(&corpus.frames, &frames, &segment.states);
        }
        stats
    }
}

/// Posterior Gamma rate of a precision given `n` observations with sum
/// `sum` and sum of squares `sum_sq`.
///
/// With no observations the prior rate is returned unchanged.
pub fn update_gamma_rate(b0: f64, sum_sq: f64, sum: f64, n: f64, mu0: f64, kappa: f64) -> f64 {
    if n <= 0.0 {
        return b0;
    }
    let mean = sum / n;
    b0 + 0.5 * (sum_sq - sum * sum / n) + kappa * n * (mean - mu0).powi(2) / (2.0 * (kappa + n))
}

/// Dirichlet pseudo-count of transition `from → to`.
fn trans_prior(alpha: f64, skip: bool, from: usize, to: usize) -> f64 {
    if skip {
        let favoured = (from == 0 && to <= 1) || (from == 1 && to == 1);
        if favoured { alpha * TRANS_PRIOR_BOOST } else { alpha }
    } else if from == 1 && to == 1 {
        alpha * ADJACENT_LOOP_BOOST
    } else {
        alpha
    }
}

fn allowed(skip: bool, state_num: usize, from: usize, to: usize) -> bool {
    if skip {
        is_reachable(state_num, from, to)
    } else {
        is_adjacent(state_num, from, to)
    }
}

impl Sampler {
    /// Draw new transitions and emissions for `cluster` from the posterior
    /// given `stats`.
    pub fn sample_hmm_parameters(&mut self, cluster: &mut Cluster, stats: &SufficientStats) {
        let trans = self.sample_trans(cluster.state_num(), &stats.trans_counts);
        cluster.set_trans(trans);

        let kappa = self.prior.norm_kappa;
        let mu0 = self.prior.norm_mu0;
        for s in 0..cluster.state_num() {
            let n = stats.frame_counts[s];
            let mut mean = Vec::with_capacity(cluster.dim());
            let mut precision = Vec::with_capacity(cluster.dim());
            for d in 0..cluster.dim() {
                let sum = stats.sums[s][d];
                let rate = update_gamma_rate(
                    self.prior.gamma_rate,
                    stats.sum_squares[s][d],
                    sum,
                    n,
                    mu0,
                    kappa,
                );
                let lambda =
                    gamma(&mut self.rng, self.prior.gamma_shape + n / 2.0, rate).max(f64::MIN_POSITIVE);
                let centre = (kappa * mu0 + sum) / (kappa + n);
                let spread = 1.0 / ((kappa + n) * lambda).sqrt();
                mean.push(normal(&mut self.rng, centre, spread));
                precision.push(lambda);
            }
            cluster.set_emission(s, mean, precision);
        }
    }

    /// Log transition matrix with each row drawn from its Dirichlet posterior.
    pub fn sample_trans(&mut self, state_num: usize, counts: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let alpha = self.prior.gamma_trans_alpha;
        let skip = self.prior.skip;
        (0..state_num)
            .map(|i| {
                let columns: Vec<usize> = (0..=state_num)
                    .filter(|&j| allowed(skip, state_num, i, j))
                    .collect();
                let row_counts: Vec<f64> = columns.iter().map(|&j| counts[i][j]).collect();
                let row_prior: Vec<f64> = columns
                    .iter()
                    .map(|&j| trans_prior(alpha, skip, i, j))
                    .collect();
                let draw = dirichlet(&mut self.rng, &row_counts, &row_prior);

                let mut row = vec![f64::NEG_INFINITY; state_num + 1];
                for (&j, p) in columns.iter().zip(draw) {
                    row[j] = p.ln();
                }
                row
            })
            .collect()
    }

    /// A new cluster drawn from the base distribution.
    pub fn sample_cluster_from_base(&mut self) -> Cluster {
        let mut cluster = Cluster::new(self.prior.state_num, self.prior.dim);
        let stats = SufficientStats::new(self.prior.state_num, self.prior.dim);
        self.sample_hmm_parameters(&mut cluster, &stats);
        cluster
    }

    /// Resample a live cluster from its members and advance its age.
    ///
    /// Returns `false` if no such cluster exists.
    pub fn resample_cluster(&mut self, corpus: &mut Corpus, id: ClusterId) -> bool {
        let Some(cluster) = corpus.clusters.get(id) else {
            return false;
        };
        let stats = SufficientStats::collect(corpus, cluster);
        let Some(cluster) = corpus.clusters.get_mut(id) else {
            return false;
        };
        self.sample_hmm_parameters(cluster, &stats);
        cluster.update_age();
        true
    }
}
