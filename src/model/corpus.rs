//! Owner of all sampler state: frames, bounds, live segments and live clusters.
//!
//! Everything the sampler mutates lives here and is passed explicitly; there
//! are no process-wide counters.

use super::{
    Arena, Bound, BoundId, Cluster, ClusterId, FrameStore, Segment, SegmentId,
};
use crate::error::{DpsegError, Result};
use std::collections::HashSet;

/// Live clusters with unique ids.
#[derive(Debug, Clone, Default)]
pub struct ClusterSet {
    clusters: Vec<Cluster>,
    next_id: ClusterId,
}

impl ClusterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Cluster> {
        self.clusters.iter_mut()
    }

    pub fn as_slice(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn ids(&self) -> Vec<ClusterId> {
        self.clusters.iter().filter_map(Cluster::id).collect()
    }

    pub fn get(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id() == Some(id))
    }

    pub fn get_mut(&mut self, id: ClusterId) -> Option<&mut Cluster> {
        self.clusters.iter_mut().find(|c| c.id() == Some(id))
    }

    pub fn contains(&self, id: ClusterId) -> bool {
        self.get(id).is_some()
    }

    /// Register a cluster and return its id.
    ///
    /// A fresh cluster gets the next unused id. A cluster that already
    /// carries an id (restored from a snapshot) keeps it, and later ids are
    /// allocated above it.
    pub fn register(&mut self, mut cluster: Cluster) -> ClusterId {
        let id = match cluster.id() {
            Some(id) => id,
            None => {
                let id = self.next_id;
                cluster.set_id(id);
                id
            }
        };
        debug_assert!(!self.contains(id), "duplicate cluster id {}", id);
        self.next_id = self.next_id.max(id + 1);
        self.clusters.push(cluster);
        id
    }

    pub fn remove(&mut self, id: ClusterId) -> Option<Cluster> {
        let pos = self.clusters.iter().position(|c| c.id() == Some(id))?;
        Some(self.clusters.remove(pos))
    }

    /// Delete the cluster if it has no members left.
    pub fn remove_if_empty(&mut self, id: ClusterId) -> bool {
        if self.get(id).is_some_and(|c| c.member_count() == 0) {
            self.remove(id);
            log::trace!("Removed empty cluster {}", id);
            true
        } else {
            false
        }
    }

    /// Segments currently counted in some cluster.
    pub fn total_members(&self) -> usize {
        self.clusters.iter().map(Cluster::member_count).sum()
    }
}

#[derive(Debug, Clone)]
pub struct Corpus {
    pub frames: FrameStore,
    /// Every bound, in creation order.
    pub bounds: Vec<Bound>,
    pub segments: Arena<Segment>,
    pub clusters: ClusterSet,
}

impl Corpus {
    pub fn new(dim: usize) -> Self {
        Self {
            frames: FrameStore::new(dim),
            bounds: Vec::new(),
            segments: Arena::new(),
            clusters: ClusterSet::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.frames.dim()
    }

    /// Live segment count.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Live cluster count.
    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Append a bound covering utterance frames `start..=end` whose feature
    /// values are `values` (`frame_count * dim` floats).
    ///
    /// Empty spans (`end < start`) are skipped and consume no index.
    pub fn push_bound(
        &mut self,
        start: usize,
        end: usize,
        utterance_end: bool,
        values: &[f32],
    ) -> Option<BoundId> {
        if end < start {
            return None;
        }
        let index = self.bounds.len();
        let global_start = self.frames.extend(values);
        self.bounds.push(Bound {
            index,
            start,
            end,
            dim: self.dim(),
            global_start,
            utterance_end,
            phoneme_end: false,
            parent: None,
        });
        Some(index)
    }

    /// Global frame offsets of a segment, in order.
    pub fn segment_frames(&self, segment: &Segment) -> Vec<usize> {
        segment
            .bounds
            .iter()
            .flat_map(|&b| self.bounds[b].frames())
            .collect()
    }

    /// First and last utterance frame of a segment.
    pub fn segment_span(&self, segment: &Segment) -> (usize, usize) {
        (
            self.bounds[segment.first_bound()].start,
            self.bounds[segment.last_bound()].end,
        )
    }

    /// Store a segment and point its bounds at it.
    pub fn insert_segment(&mut self, segment: Segment) -> SegmentId {
        let members = segment.bounds.clone();
        let id = self.segments.insert(segment);
        for b in members {
            self.bounds[b].parent = Some(id);
        }
        id
    }

    /// Take a segment out of the live set; its bounds are left without a
    /// parent until the caller inserts a replacement.
    pub fn remove_segment(&mut self, id: SegmentId) -> Option<Segment> {
        let segment = self.segments.remove(id)?;
        for &b in &segment.bounds {
            if self.bounds[b].parent == Some(id) {
                self.bounds[b].parent = None;
            }
        }
        Some(segment)
    }

    /// Drop a live segment's membership from its cluster.
    ///
    /// The cluster is kept even when emptied; the caller decides when to
    /// clean it up.
    pub fn decluster(&mut self, id: SegmentId) -> Result<()> {
        let segment = self
            .segments
            .get(id)
            .ok_or_else(|| DpsegError::Other(format!("segment {} is not live", id.index())))?;
        let removed = match segment.cluster {
            Some(cluster) => self
                .clusters
                .get_mut(cluster)
                .is_some_and(|c| c.remove_member(id)),
            None => false,
        };
        if removed {
            return Ok(());
        }
        let (start, end) = self.segment_span(segment);
        let cluster = segment
            .cluster
            .map_or_else(|| "none".to_string(), |c| c.to_string());
        log::error!(
            "Cannot remove {} frame {} to frame {} from cluster {}",
            segment.tag,
            start,
            end,
            cluster
        );
        Err(DpsegError::Bookkeeping {
            tag: segment.tag.clone(),
            start,
            end,
            cluster,
        })
    }

    /// Live segments ordered by position in the bound sequence.
    pub fn ordered_segments(&self) -> Vec<SegmentId> {
        self.bounds
            .iter()
            .filter_map(|bound| {
                let parent = bound.parent?;
                let segment = self.segments.get(parent)?;
                (segment.first_bound() == bound.index).then_some(parent)
            })
            .collect()
    }

    /// Verify partition coverage and cluster accounting.
    ///
    /// Holds between completed boundary moves; returns a description of the
    /// first violation found.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let mut covered = 0;
        for (id, segment) in self.segments.iter() {
            if segment.bounds.is_empty() {
                return Err(format!("segment {} has no bounds", id.index()));
            }
            for (k, &b) in segment.bounds.iter().enumerate() {
                let bound = self
                    .bounds
                    .get(b)
                    .ok_or_else(|| format!("segment {} refers to missing bound {}", id.index(), b))?;
                if bound.parent != Some(id) {
                    return Err(format!("bound {} does not point at its segment", b));
                }
                if k > 0 && b != segment.bounds[k - 1] + 1 {
                    return Err(format!("segment {} is not contiguous at bound {}", id.index(), b));
                }
                let last = k + 1 == segment.bounds.len();
                if bound.phoneme_end != last {
                    return Err(format!("bound {} boundary flag disagrees with its segment", b));
                }
            }
            covered += segment.bounds.len();
        }
        if covered != self.bounds.len() {
            return Err(format!(
                "segments cover {} of {} bounds",
                covered,
                self.bounds.len()
            ));
        }

        let mut seen = HashSet::new();
        for cluster in self.clusters.iter() {
            let id = cluster
                .id()
                .ok_or_else(|| "unregistered cluster in live set".to_string())?;
            if !seen.insert(id) {
                return Err(format!("duplicate cluster id {}", id));
            }
            let assigned = self
                .segments
                .iter()
                .filter(|(_, s)| s.cluster == Some(id))
                .count();
            if assigned != cluster.member_count() {
                return Err(format!(
                    "cluster {} lists {} members but {} segments point at it",
                    id,
                    cluster.member_count(),
                    assigned
                ));
            }
            for &member in cluster.members() {
                match self.segments.get(member) {
                    Some(segment) if segment.cluster == Some(id) => {}
                    _ => return Err(format!("cluster {} lists a stale member", id)),
                }
            }
        }
        for (id, segment) in self.segments.iter() {
            match segment.cluster {
                Some(c) if seen.contains(&c) => {}
                _ => return Err(format!("segment {} has no live cluster", id.index())),
            }
        }
        Ok(())
    }
}
