//! A run of bounds hypothesized to be one acoustic unit.

use super::{BoundId, ClusterId};

/// Log evidence of a segment under the cluster set it was scored against.
///
/// Only valid while the recorded cluster is live and its parameters have
/// not been resampled since (`age` unchanged).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedEvidence {
    pub cluster: ClusterId,
    pub age: u64,
    pub log_evidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Utterance identifier.
    pub tag: String,
    /// Member bounds, in order. Never empty.
    pub bounds: Vec<BoundId>,
    pub cluster: Option<ClusterId>,
    pub evidence: Option<CachedEvidence>,
    /// Viterbi state path, one entry per frame, under `cluster`.
    pub states: Vec<usize>,
}

impl Segment {
    pub fn new(tag: impl Into<String>, bounds: Vec<BoundId>) -> Self {
        debug_assert!(!bounds.is_empty(), "segment without bounds");
        Self {
            tag: tag.into(),
            bounds,
            cluster: None,
            evidence: None,
            states: Vec::new(),
        }
    }

    /// Drop the cluster assignment and everything derived from it.
    pub fn clear_assignment(&mut self) {
        self.cluster = None;
        self.evidence = None;
        self.states.clear();
    }

    pub fn first_bound(&self) -> BoundId {
        self.bounds[0]
    }

    pub fn last_bound(&self) -> BoundId {
        self.bounds[self.bounds.len() - 1]
    }
}
