//! Cluster assignment for a single segment.
//!
//! Scoring ([`Sampler::sample_just_cluster`]) and committing
//! ([`Sampler::assign_and_decode`]) are separate so the boundary move can
//! score hypotheses it may later throw away without touching the corpus.

use super::Sampler;
use super::categorical::{sample_index_from_distribution, sample_index_from_log_distribution, sum_logs};
use crate::defaults::ZERO_MEMBER_LOG_PRIOR;
use crate::error::{DpsegError, Result};
use crate::model::{Bound, CachedEvidence, Cluster, ClusterId, Corpus, Segment, SegmentId};

/// Cluster picked for a segment that has not been committed yet.
#[derive(Debug, Clone)]
pub enum ClusterChoice {
    Existing(ClusterId),
    /// Drawn from the base distribution; registered only on commit.
    Fresh(Box<Cluster>),
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub choice: ClusterChoice,
    /// `ln Σ_k P(k) P(x | k)` over every candidate scored.
    pub log_evidence: f64,
}

impl Sampler {
    /// Log prior of an existing cluster with `members` out of `total`
    /// assigned segments.
    ///
    /// This is `ln(m/N)`, not the Chinese-restaurant `ln(m/(N+α))` that
    /// pairs with [`Self::new_cluster_prior`], so existing clusters are
    /// favoured over a new one by a factor of `(N+α)/N`.
    pub fn non_dp_prior(&self, members: usize, total: usize) -> f64 {
        if members == 0 || total == 0 {
            ZERO_MEMBER_LOG_PRIOR
        } else {
            (members as f64 / total as f64).ln()
        }
    }

    /// Log prior of opening a new cluster.
    pub fn new_cluster_prior(&self, total: usize) -> f64 {
        let alpha = self.prior.dp_alpha;
        (alpha / (total as f64 + alpha)).ln()
    }

    /// Score `segment` against every live cluster plus one fresh draw from
    /// the base distribution and pick one.
    ///
    /// Membership is left untouched.
    pub fn sample_just_cluster(&mut self, corpus: &Corpus, segment: &Segment) -> Assignment {
        let frames = corpus.segment_frames(segment);
        let total = corpus.clusters.total_members();

        let mut posteriors = Vec::with_capacity(corpus.cluster_count() + 1);
        for cluster in corpus.clusters.iter() {
            let prior = self.non_dp_prior(cluster.member_count(), total);
            posteriors.push(prior + cluster.compute_likelihood(&corpus.frames, &frames));
        }
        let fresh = self.sample_cluster_from_base();
        posteriors.push(self.new_cluster_prior(total) + fresh.compute_likelihood(&corpus.frames, &frames));

        let u = self.sample_from_unit();
        let index = sample_index_from_log_distribution(&posteriors, u);
        let log_evidence = sum_logs(&posteriors);

        let existing = corpus.clusters.as_slice().get(index).and_then(Cluster::id);
        let choice = match existing {
            Some(id) => ClusterChoice::Existing(id),
            None => ClusterChoice::Fresh(Box::new(fresh)),
        };
        Assignment {
            choice,
            log_evidence,
        }
    }

    /// Reuse the segment's cached assignment when it is still valid.
    pub fn cached_assignment(&self, corpus: &Corpus, segment: &Segment) -> Option<Assignment> {
        let evidence = segment.evidence?;
        let cluster = corpus.clusters.get(evidence.cluster)?;
        (segment.cluster == Some(evidence.cluster) && cluster.age() == evidence.age).then(|| {
            Assignment {
                choice: ClusterChoice::Existing(evidence.cluster),
                log_evidence: evidence.log_evidence,
            }
        })
    }

    /// Cached assignment if valid, otherwise a fresh draw.
    pub fn resolve_assignment(&mut self, corpus: &Corpus, segment: &Segment) -> Assignment {
        match self.cached_assignment(corpus, segment) {
            Some(assignment) => assignment,
            None => self.sample_just_cluster(corpus, segment),
        }
    }

    /// Commit `segment` to the chosen cluster.
    ///
    /// A fresh cluster is registered first. The segment is decoded, stored
    /// in the corpus with its evidence cached, and appended to the
    /// cluster's members.
    pub fn assign_and_decode(
        &self,
        corpus: &mut Corpus,
        mut segment: Segment,
        assignment: Assignment,
    ) -> Result<SegmentId> {
        let id = match assignment.choice {
            ClusterChoice::Existing(id) => id,
            ClusterChoice::Fresh(cluster) => {
                let id = corpus.clusters.register(*cluster);
                log::trace!("Opened cluster {}", id);
                id
            }
        };
        let frames = corpus.segment_frames(&segment);
        let cluster = corpus
            .clusters
            .get(id)
            .ok_or_else(|| DpsegError::Other(format!("cluster {} is not live", id)))?;
        let decoding = cluster.viterbi(&corpus.frames, &frames);

        segment.cluster = Some(id);
        segment.states = decoding.states;
        segment.evidence = Some(CachedEvidence {
            cluster: id,
            age: cluster.age(),
            log_evidence: assignment.log_evidence,
        });
        let segment_id = corpus.insert_segment(segment);
        if let Some(cluster) = corpus.clusters.get_mut(id) {
            cluster.append_member(segment_id);
        }
        Ok(segment_id)
    }

    /// Boundary decision from the prior alone, used while loading.
    ///
    /// The last bound of an utterance always closes a segment.
    pub fn sample_boundary_from_prior(&mut self, bound: &Bound) -> bool {
        if bound.utterance_end {
            return true;
        }
        let u = self.sample_from_unit();
        sample_index_from_distribution(&self.boundary_prior, u) == 1
    }
}
