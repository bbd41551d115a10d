//! The boundary move: resample whether a segment ends at one bound.
//!
//! Each bound is one of three sites. An interior bound competes its parent
//! segment against the two halves split at the bound. A bound that already
//! ends a segment competes the two segments around it against their merge.
//! The last bound of an utterance is always a boundary, so only its
//! segment's cluster is resampled.
//!
//! Hypotheses are owned [`Segment`] values. Only the winner enters the
//! corpus; the loser and any fresh cluster it drew are dropped.

use super::categorical::sample_index_from_log_distribution;
use super::{Assignment, Sampler};
use crate::error::{DpsegError, Result};
use crate::model::{BoundId, ClusterId, Corpus, Segment, SegmentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    Interior,
    Boundary,
    UtteranceEnd,
}

impl Site {
    pub fn of(corpus: &Corpus, bound: BoundId) -> Self {
        let bound = &corpus.bounds[bound];
        if bound.utterance_end {
            Site::UtteranceEnd
        } else if bound.phoneme_end {
            Site::Boundary
        } else {
            Site::Interior
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub site: Site,
    /// A boundary follows the bound after the move.
    pub boundary: bool,
}

fn parent_of(corpus: &Corpus, bound: BoundId) -> Result<SegmentId> {
    corpus.bounds[bound]
        .parent
        .ok_or_else(|| DpsegError::Other(format!("bound {} has no segment", bound)))
}

/// Take a segment out of the corpus, keeping a copy.
fn detach(corpus: &mut Corpus, id: SegmentId, touched: &mut Vec<ClusterId>) -> Result<Segment> {
    corpus.decluster(id)?;
    let segment = corpus
        .remove_segment(id)
        .ok_or_else(|| DpsegError::Other(format!("segment {} is not live", id.index())))?;
    if let Some(cluster) = segment.cluster {
        touched.push(cluster);
    }
    Ok(segment)
}

impl Sampler {
    /// Run one boundary move at `bound`.
    ///
    /// Partition coverage and cluster accounting hold again once this
    /// returns `Ok`.
    pub fn sample_boundary(&mut self, corpus: &mut Corpus, bound: BoundId) -> Result<MoveOutcome> {
        let site = Site::of(corpus, bound);
        let boundary = match site {
            Site::UtteranceEnd => {
                self.resample_final_segment(corpus, bound)?;
                true
            }
            Site::Interior => {
                let mut touched = Vec::new();
                let parent_id = parent_of(corpus, bound)?;
                let parent = detach(corpus, parent_id, &mut touched)?;
                let split = parent
                    .bounds
                    .iter()
                    .position(|&b| b == bound)
                    .map_or(parent.bounds.len(), |k| k + 1);
                let left = Segment::new(parent.tag.clone(), parent.bounds[..split].to_vec());
                let right = Segment::new(parent.tag.clone(), parent.bounds[split..].to_vec());
                self.compare_and_commit(corpus, bound, parent, left, right, &touched)?
            }
            Site::Boundary => {
                let mut touched = Vec::new();
                let left_id = parent_of(corpus, bound)?;
                let right_id = parent_of(corpus, bound + 1)?;
                let left = detach(corpus, left_id, &mut touched)?;
                let right = detach(corpus, right_id, &mut touched)?;
                let mut merged_bounds = left.bounds.clone();
                merged_bounds.extend_from_slice(&right.bounds);
                let merged = Segment::new(left.tag.clone(), merged_bounds);
                self.compare_and_commit(corpus, bound, merged, left, right, &touched)?
            }
        };
        Ok(MoveOutcome { site, boundary })
    }

    /// Score the joined hypothesis against the split pair, commit the
    /// winner and drop clusters the move emptied.
    ///
    /// Returns `true` if the split pair won.
    fn compare_and_commit(
        &mut self,
        corpus: &mut Corpus,
        bound: BoundId,
        joined: Segment,
        left: Segment,
        right: Segment,
        touched: &[ClusterId],
    ) -> Result<bool> {
        let joined_assignment = self.resolve_assignment(corpus, &joined);
        let left_assignment = self.resolve_assignment(corpus, &left);
        let right_assignment = self.resolve_assignment(corpus, &right);

        let scores = [
            joined_assignment.log_evidence + self.boundary_prior_log[0],
            left_assignment.log_evidence
                + right_assignment.log_evidence
                + self.boundary_prior_log[1],
        ];
        let u = self.sample_from_unit();
        let split = sample_index_from_log_distribution(&scores, u) == 1;

        if split {
            self.assign_and_decode(corpus, left, left_assignment)?;
            self.assign_and_decode(corpus, right, right_assignment)?;
        } else {
            self.assign_and_decode(corpus, joined, joined_assignment)?;
        }
        corpus.bounds[bound].phoneme_end = split;

        for &cluster in touched {
            corpus.clusters.remove_if_empty(cluster);
        }
        Ok(split)
    }

    /// Resample the cluster of the segment closing an utterance.
    ///
    /// A still-valid cached assignment is reused as is.
    fn resample_final_segment(&mut self, corpus: &mut Corpus, bound: BoundId) -> Result<()> {
        let mut touched = Vec::new();
        let parent_id = parent_of(corpus, bound)?;
        let cached = corpus
            .segments
            .get(parent_id)
            .and_then(|segment| self.cached_assignment(corpus, segment));
        let segment = detach(corpus, parent_id, &mut touched)?;

        let assignment: Assignment = match cached {
            Some(assignment) => assignment,
            None => {
                for &cluster in &touched {
                    corpus.clusters.remove_if_empty(cluster);
                }
                self.sample_just_cluster(corpus, &segment)
            }
        };
        self.assign_and_decode(corpus, segment, assignment)?;
        corpus.bounds[bound].phoneme_end = true;

        for &cluster in &touched {
            corpus.clusters.remove_if_empty(cluster);
        }
        Ok(())
    }
}
