//! One Dirichlet-process mixture component: a left-to-right HMM with
//! diagonal Gaussian emissions.

use super::{FrameStore, SegmentId};
use std::f64::consts::PI;
use std::ops::Range;

/// Globally unique cluster id, assigned when a component is first used.
pub type ClusterId = u32;

/// Whether the topology allows a transition `from → to`.
///
/// Column `state_num` is the exit. Every state may loop or move right; the
/// first state may skip to any state or exit directly, middle states cannot
/// exit, the last state can only loop or exit.
pub fn is_reachable(state_num: usize, from: usize, to: usize) -> bool {
    if from >= state_num || to > state_num || to < from {
        return false;
    }
    to < state_num || from == 0 || from == state_num - 1
}

/// Whether `from → to` is allowed without skipping: every state loops or
/// advances by one, and only the last state exits.
pub fn is_adjacent(state_num: usize, from: usize, to: usize) -> bool {
    from < state_num && (to == from || to == from + 1)
}

/// Best state path for a frame sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoding {
    pub log_likelihood: f64,
    pub states: Vec<usize>,
}

/// Per-frame emission scores over a contiguous frame range.
#[derive(Debug, Clone)]
struct EmissionCache {
    frames: Range<usize>,
    /// Frame-major, `state_num` scores per frame.
    scores: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct Cluster {
    id: Option<ClusterId>,
    state_num: usize,
    dim: usize,
    /// Log transition probabilities, `state_num × (state_num + 1)`;
    /// unreachable entries are `-inf`.
    trans: Vec<Vec<f64>>,
    means: Vec<Vec<f64>>,
    precisions: Vec<Vec<f64>>,
    /// Per-state Gaussian normaliser, `0.5 * Σ_d (ln λ_d − ln 2π)`.
    log_norms: Vec<f64>,
    members: Vec<SegmentId>,
    age: u64,
    cache: Option<EmissionCache>,
}

impl Cluster {
    /// Unregistered cluster with flat skip-topology transitions and
    /// unit-precision, zero-mean emissions.
    pub fn new(state_num: usize, dim: usize) -> Self {
        let trans = (0..state_num)
            .map(|i| {
                let reachable = (0..=state_num)
                    .filter(|&j| is_reachable(state_num, i, j))
                    .count() as f64;
                (0..=state_num)
                    .map(|j| {
                        if is_reachable(state_num, i, j) {
                            -reachable.ln()
                        } else {
                            f64::NEG_INFINITY
                        }
                    })
                    .collect()
            })
            .collect();
        let mut cluster = Self {
            id: None,
            state_num,
            dim,
            trans,
            means: vec![vec![0.0; dim]; state_num],
            precisions: vec![vec![1.0; dim]; state_num],
            log_norms: vec![0.0; state_num],
            members: Vec::new(),
            age: 0,
            cache: None,
        };
        for s in 0..state_num {
            cluster.refresh_log_norm(s);
        }
        cluster
    }

    /// `None` until the cluster is registered in a cluster set.
    pub fn id(&self) -> Option<ClusterId> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: ClusterId) {
        self.id = Some(id);
    }

    pub fn state_num(&self) -> usize {
        self.state_num
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn update_age(&mut self) {
        self.age += 1;
    }

    pub fn members(&self) -> &[SegmentId] {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn append_member(&mut self, segment: SegmentId) {
        self.members.push(segment);
    }

    /// Remove one membership entry; `false` if the segment was not a member.
    pub fn remove_member(&mut self, segment: SegmentId) -> bool {
        match self.members.iter().position(|&m| m == segment) {
            Some(pos) => {
                self.members.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    pub(crate) fn take_members(&mut self) -> Vec<SegmentId> {
        std::mem::take(&mut self.members)
    }

    pub fn trans(&self) -> &[Vec<f64>] {
        &self.trans
    }

    /// Replace the log transition matrix. Precomputed emission scores stay valid.
    pub fn set_trans(&mut self, trans: Vec<Vec<f64>>) {
        debug_assert_eq!(trans.len(), self.state_num);
        self.trans = trans;
    }

    pub fn mean(&self, state: usize) -> &[f64] {
        &self.means[state]
    }

    pub fn precision(&self, state: usize) -> &[f64] {
        &self.precisions[state]
    }

    /// Replace the emission parameters of one state and drop the cache.
    pub fn set_emission(&mut self, state: usize, mean: Vec<f64>, precision: Vec<f64>) {
        debug_assert_eq!(mean.len(), self.dim);
        debug_assert_eq!(precision.len(), self.dim);
        self.means[state] = mean;
        self.precisions[state] = precision;
        self.refresh_log_norm(state);
        self.cache = None;
    }

    fn refresh_log_norm(&mut self, state: usize) {
        let ln_2pi = (2.0 * PI).ln();
        self.log_norms[state] = self.precisions[state]
            .iter()
            .map(|&p| 0.5 * (p.ln() - ln_2pi))
            .sum();
    }

    /// Log density of one frame under one state's diagonal Gaussian.
    pub fn emission_log_likelihood(&self, state: usize, frame: &[f32]) -> f64 {
        let mean = &self.means[state];
        let precision = &self.precisions[state];
        let quad: f64 = frame
            .iter()
            .zip(mean.iter().zip(precision))
            .map(|(&x, (&mu, &p))| {
                let diff = x as f64 - mu;
                p * diff * diff
            })
            .sum();
        self.log_norms[state] - 0.5 * quad
    }

    fn emission_at(&self, store: &FrameStore, frame: usize, state: usize) -> f64 {
        if let Some(cache) = &self.cache
            && cache.frames.contains(&frame)
        {
            return cache.scores[(frame - cache.frames.start) * self.state_num + state];
        }
        self.emission_log_likelihood(state, store.frame(frame))
    }

    /// Score every state on every frame of `frames` ahead of time.
    pub fn precompute(&mut self, store: &FrameStore, frames: Range<usize>) {
        let mut scores = Vec::with_capacity(frames.len() * self.state_num);
        for f in frames.clone() {
            let frame = store.frame(f);
            for s in 0..self.state_num {
                scores.push(self.emission_log_likelihood(s, frame));
            }
        }
        self.cache = Some(EmissionCache { frames, scores });
    }

    pub fn is_precomputed(&self) -> bool {
        self.cache.is_some()
    }

    pub fn clear_precompute(&mut self) {
        self.cache = None;
    }

    /// Viterbi decoding of a frame sequence, entering in state 0 and
    /// leaving through the exit column.
    pub fn viterbi(&self, store: &FrameStore, frames: &[usize]) -> Decoding {
        let n = self.state_num;
        if frames.is_empty() || n == 0 {
            return Decoding {
                log_likelihood: f64::NEG_INFINITY,
                states: Vec::new(),
            };
        }

        let mut delta = vec![f64::NEG_INFINITY; n];
        let mut next = vec![f64::NEG_INFINITY; n];
        let mut back = vec![0usize; frames.len() * n];
        delta[0] = self.emission_at(store, frames[0], 0);

        for (t, &frame) in frames.iter().enumerate().skip(1) {
            for j in 0..n {
                let mut best = f64::NEG_INFINITY;
                let mut arg = 0;
                for (i, &score) in delta.iter().enumerate().take(j + 1) {
                    let v = score + self.trans[i][j];
                    if v > best {
                        best = v;
                        arg = i;
                    }
                }
                back[t * n + j] = arg;
                next[j] = if best == f64::NEG_INFINITY {
                    best
                } else {
                    best + self.emission_at(store, frame, j)
                };
            }
            std::mem::swap(&mut delta, &mut next);
        }

        let mut best = f64::NEG_INFINITY;
        let mut last = 0;
        for (i, &score) in delta.iter().enumerate() {
            let v = score + self.trans[i][n];
            if v > best {
                best = v;
                last = i;
            }
        }

        let mut states = vec![0; frames.len()];
        states[frames.len() - 1] = last;
        for t in (1..frames.len()).rev() {
            states[t - 1] = back[t * n + states[t]];
        }

        Decoding {
            log_likelihood: best,
            states,
        }
    }

    /// Best-path log probability of a frame sequence.
    pub fn compute_likelihood(&self, store: &FrameStore, frames: &[usize]) -> f64 {
        self.viterbi(store, frames).log_likelihood
    }
}
