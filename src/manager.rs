//! Training orchestration.
//!
//! The [`Manager`] loads utterances into the corpus, batches them into
//! groups and drives the outer Gibbs loop: each sweep resamples cluster
//! parameters, then every boundary of the active group left to right.

use crate::config::Config;
use crate::defaults::UNLABELED;
use crate::error::{DpsegError, Result};
use crate::io::{self, InputPair, SNAPSHOT_FILE, Snapshot, Utterance};
use crate::model::{ClusterId, Corpus, Segment, SegmentId};
use crate::sampler::{Assignment, ClusterChoice, Sampler};
use log::{debug, info, warn};
use std::ops::Range;
use std::path::Path;

pub struct Manager {
    config: Config,
    corpus: Corpus,
    sampler: Sampler,
    /// Bound count at the end of each batch group.
    batch_groups: Vec<usize>,
}

impl Manager {
    pub fn new(config: Config) -> Self {
        let corpus = Corpus::new(config.prior.dim);
        let sampler = Sampler::new(config.prior.clone(), config.training.seed);
        Self {
            config,
            corpus,
            sampler,
            batch_groups: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn corpus_mut(&mut self) -> &mut Corpus {
        &mut self.corpus
    }

    pub fn batch_groups(&self) -> &[usize] {
        &self.batch_groups
    }

    /// Load every utterance in `listing`, drawing initial boundaries from
    /// the prior and assigning each segment a cluster.
    ///
    /// Returns the number of utterances loaded.
    pub fn load_bounds(&mut self, listing: &Path) -> Result<usize> {
        let pairs = io::read_listing(listing)?;
        self.load_pairs(&pairs, false)
    }

    /// Load labeled utterances: a labeled span closes a segment routed to
    /// that cluster id.
    pub fn load_labeled(&mut self, listing: &Path) -> Result<usize> {
        let pairs = io::read_listing(listing)?;
        self.load_pairs(&pairs, true)
    }

    /// Restore clusters from a snapshot, dropping those that had at most
    /// `threshold` members. Kept clusters keep their ids and start empty.
    ///
    /// Returns the number of clusters kept.
    pub fn load_model(&mut self, path: &Path, threshold: usize) -> Result<usize> {
        let snapshot = Snapshot::read(path)?;
        let prior = &self.config.prior;
        let mut kept = 0;
        for record in &snapshot.clusters {
            if record.state_num != prior.state_num || record.dim != prior.dim {
                return Err(DpsegError::Snapshot {
                    message: format!(
                        "cluster {} has {} states of dimension {}, configured {} of {}",
                        record.id, record.state_num, record.dim, prior.state_num, prior.dim
                    ),
                });
            }
            if record.member_count as usize > threshold {
                self.corpus.clusters.register(record.to_cluster());
                kept += 1;
            }
        }
        info!(
            "Loaded {} of {} clusters from {}",
            kept,
            snapshot.clusters.len(),
            path.display()
        );
        Ok(kept)
    }

    /// Resume: restore the model, then load labeled data against it.
    pub fn load_snapshot(&mut self, snapshot: &Path, listing: &Path, threshold: usize) -> Result<usize> {
        self.load_model(snapshot, threshold)?;
        self.load_labeled(listing)
    }

    fn load_pairs(&mut self, pairs: &[InputPair], labeled: bool) -> Result<usize> {
        let group_size = self.config.training.group_size.max(1);
        let refresh = self.config.training.load_refresh_interval;

        for (n, pair) in pairs.iter().enumerate() {
            let utterance = Utterance::load(pair, self.corpus.dim(), labeled)?;
            info!(
                "Loading {} ({} frames)",
                pair.index.display(),
                utterance.index.total_frames
            );
            self.load_utterance(&utterance, labeled)?;
            debug!(
                "{} segments, {} clusters",
                self.corpus.segment_count(),
                self.corpus.cluster_count()
            );

            let loaded = n + 1;
            if loaded % group_size == 0 {
                self.batch_groups.push(self.corpus.bounds.len());
            }
            if refresh > 0 && loaded % refresh == 0 {
                debug!("Refreshing clusters after {} files", loaded);
                self.update_clusters(false, 0);
            }
        }
        if pairs.len() % group_size != 0 {
            self.batch_groups.push(self.corpus.bounds.len());
        }
        if self.corpus.bounds.is_empty() {
            return Err(DpsegError::EmptyCorpus);
        }
        info!(
            "Loaded {} files: {} bounds, {} segments, {} clusters, {} groups",
            pairs.len(),
            self.corpus.bounds.len(),
            self.corpus.segment_count(),
            self.corpus.cluster_count(),
            self.batch_groups.len()
        );
        Ok(pairs.len())
    }

    fn load_utterance(&mut self, utterance: &Utterance, labeled: bool) -> Result<()> {
        let Some(last) = utterance.index.entries.len().checked_sub(1) else {
            warn!("{} has no frames, skipping", utterance.tag);
            return Ok(());
        };
        let mut pending = Vec::new();
        for (k, (entry, values)) in utterance.spans().enumerate() {
            let utterance_end = k == last;
            let Some(bound) = self
                .corpus
                .push_bound(entry.start, entry.end, utterance_end, values)
            else {
                continue;
            };
            pending.push(bound);

            let boundary = if labeled {
                entry.is_labeled() || utterance_end
            } else {
                self.sampler
                    .sample_boundary_from_prior(&self.corpus.bounds[bound])
            };
            if boundary {
                self.corpus.bounds[bound].phoneme_end = true;
                let segment = Segment::new(utterance.tag.clone(), std::mem::take(&mut pending));
                let label = if labeled { entry.label } else { UNLABELED };
                self.route_new_segment(segment, label)?;
            }
        }
        Ok(())
    }

    /// Assign a segment built during loading. A known cluster label is
    /// used directly; anything else is sampled.
    fn route_new_segment(&mut self, segment: Segment, label: i64) -> Result<SegmentId> {
        if label == UNLABELED {
            let assignment = self.sampler.sample_just_cluster(&self.corpus, &segment);
            return self
                .sampler
                .assign_and_decode(&mut self.corpus, segment, assignment);
        }
        let known = ClusterId::try_from(label)
            .ok()
            .filter(|&id| self.corpus.clusters.contains(id));
        let Some(id) = known else {
            warn!(
                "Cluster {} labeled in {} is not in the model, sampling instead",
                label, segment.tag
            );
            let assignment = self.sampler.sample_just_cluster(&self.corpus, &segment);
            return self
                .sampler
                .assign_and_decode(&mut self.corpus, segment, assignment);
        };
        let assignment = Assignment {
            choice: ClusterChoice::Existing(id),
            log_evidence: f64::NEG_INFINITY,
        };
        let segment_id = self
            .sampler
            .assign_and_decode(&mut self.corpus, segment, assignment)?;
        // Never scored, so nothing to cache.
        if let Some(segment) = self.corpus.segments.get_mut(segment_id) {
            segment.evidence = None;
        }
        Ok(segment_id)
    }

    /// Bound indices of batch group `group`.
    pub fn group_bounds(&self, group: usize) -> Range<usize> {
        let start = match group {
            0 => 0,
            g => self.batch_groups.get(g - 1).copied().unwrap_or(0),
        };
        let end = self.batch_groups.get(group).copied().unwrap_or(start);
        start..end.max(start)
    }

    /// Global frame offsets of batch group `group`.
    pub fn group_frames(&self, group: usize) -> Range<usize> {
        let bounds = self.group_bounds(group);
        match (self.corpus.bounds.get(bounds.start), bounds.end.checked_sub(1)) {
            (Some(first), Some(last)) if !bounds.is_empty() => {
                first.global_start..self.corpus.bounds[last].frames().end
            }
            _ => 0..0,
        }
    }

    /// Resample every live cluster, then precompute emission scores over
    /// `group` or drop stale ones.
    pub fn update_clusters(&mut self, precompute: bool, group: usize) {
        let frames = self.group_frames(group);
        for id in self.corpus.clusters.ids() {
            self.sampler.resample_cluster(&mut self.corpus, id);
            if let Some(cluster) = self.corpus.clusters.get_mut(id) {
                if precompute && !frames.is_empty() {
                    cluster.precompute(&self.corpus.frames, frames.clone());
                } else {
                    cluster.clear_precompute();
                }
            }
        }
    }

    /// Run the boundary move over every bound of `group`, left to right.
    pub fn update_boundaries(&mut self, group: usize) -> Result<()> {
        for bound in self.group_bounds(group) {
            self.sampler.sample_boundary(&mut self.corpus, bound)?;
        }
        Ok(())
    }

    /// Evict old, under-populated clusters and route their members
    /// through cluster assignment again.
    ///
    /// Returns the number of clusters removed.
    pub fn prune_clusters(&mut self) -> Result<usize> {
        let min_age = self.config.training.prune_min_age;
        let max_members = self.config.training.prune_max_members;
        let doomed: Vec<ClusterId> = self
            .corpus
            .clusters
            .iter()
            .filter(|c| c.age() >= min_age && c.member_count() <= max_members)
            .filter_map(|c| c.id())
            .collect();

        for &id in &doomed {
            let Some(mut cluster) = self.corpus.clusters.remove(id) else {
                continue;
            };
            debug!("Pruning cluster {} with {} members", id, cluster.member_count());
            for member in cluster.take_members() {
                let Some(mut segment) = self.corpus.remove_segment(member) else {
                    continue;
                };
                segment.clear_assignment();
                let assignment = self.sampler.sample_just_cluster(&self.corpus, &segment);
                self.sampler
                    .assign_and_decode(&mut self.corpus, segment, assignment)?;
            }
        }
        if !doomed.is_empty() {
            info!("Pruned {} clusters", doomed.len());
        }
        Ok(doomed.len())
    }

    /// Run `num_iter` sweeps, writing labels and a snapshot under
    /// `result_dir/<sweep>/` every `snapshot_interval` sweeps and after
    /// the last one.
    pub fn gibbs_sampling(&mut self, num_iter: usize, result_dir: &Path) -> Result<()> {
        if self.batch_groups.is_empty() {
            return Err(DpsegError::EmptyCorpus);
        }
        let training = &self.config.training;
        let precompute = training.precompute;
        let snapshot_interval = training.snapshot_interval;
        let prune_interval = training.prune_interval;

        for sweep in 1..=num_iter {
            let group = (sweep - 1) % self.batch_groups.len();
            debug!(
                "Sweep {} over group {}: {} clusters, {} segments",
                sweep,
                group,
                self.corpus.cluster_count(),
                self.corpus.segment_count()
            );

            if prune_interval > 0 && sweep % prune_interval == 0 {
                self.prune_clusters()?;
            }
            self.update_clusters(precompute, group);
            self.update_boundaries(group)?;

            if log::log_enabled!(log::Level::Debug)
                && let Err(violation) = self.corpus.check_invariants()
            {
                log::error!("Sweep {} left inconsistent state: {}", sweep, violation);
                return Err(DpsegError::Other(violation));
            }

            let due = snapshot_interval > 0 && sweep % snapshot_interval == 0;
            if due || sweep == num_iter {
                self.write_results(result_dir, sweep)?;
            }
            if sweep % 10 == 0 || sweep == num_iter {
                info!(
                    "Sweep {}/{}: {} clusters, {} segments",
                    sweep,
                    num_iter,
                    self.corpus.cluster_count(),
                    self.corpus.segment_count()
                );
            }
        }
        Ok(())
    }

    /// Write labels and a snapshot into `result_dir/<sweep>/`.
    pub fn write_results(&self, result_dir: &Path, sweep: usize) -> Result<()> {
        let dir = result_dir.join(sweep.to_string());
        io::write_labels(&self.corpus, &dir)?;
        let path = dir.join(SNAPSHOT_FILE);
        Snapshot::from_corpus(&self.corpus).write(&path)?;
        info!("Wrote {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PriorConfig, TrainingConfig};
    use crate::model::Cluster;

    fn config() -> Config {
        Config {
            prior: PriorConfig {
                dim: 1,
                state_num: 2,
                ..PriorConfig::default()
            },
            training: TrainingConfig {
                seed: Some(1),
                ..TrainingConfig::default()
            },
        }
    }

    fn load(manager: &mut Manager, utterances: &[&[(usize, usize)]]) {
        for spans in utterances {
            let entries = spans
                .iter()
                .map(|&(start, end)| io::IndexEntry {
                    start,
                    end,
                    label: UNLABELED,
                })
                .collect();
            let frames: usize = spans.iter().map(|(s, e)| e + 1 - s).sum();
            let index = io::IndexFile {
                total_frames: frames,
                entries,
            };
            let values = (0..frames).map(|f| f as f32 / 10.0).collect();
            let utterance = Utterance::new("utt", index, values, 1);
            manager.load_utterance(&utterance, false).unwrap();
            manager.batch_groups.push(manager.corpus.bounds.len());
        }
    }

    #[test]
    fn group_ranges_follow_watermarks() {
        let mut manager = Manager::new(config());
        load(&mut manager, &[&[(0, 1), (2, 3)], &[(0, 2)]]);

        assert_eq!(manager.batch_groups(), &[2, 3]);
        assert_eq!(manager.group_bounds(0), 0..2);
        assert_eq!(manager.group_bounds(1), 2..3);
        assert_eq!(manager.group_frames(1), 4..7);
        assert!(manager.group_bounds(5).is_empty());
    }

    #[test]
    fn loading_partitions_every_utterance() {
        let mut manager = Manager::new(config());
        load(&mut manager, &[&[(0, 1), (2, 3), (4, 5)], &[(0, 0)]]);

        let corpus = manager.corpus();
        assert_eq!(corpus.check_invariants(), Ok(()));
        assert!(corpus.bounds[2].utterance_end && corpus.bounds[2].phoneme_end);
        assert!(corpus.cluster_count() >= 1);
    }

    #[test]
    fn update_clusters_ages_and_precomputes() {
        let mut manager = Manager::new(config());
        load(&mut manager, &[&[(0, 3), (4, 7)]]);

        manager.update_clusters(true, 0);

        let corpus = manager.corpus();
        assert!(corpus.clusters.iter().all(|c| c.age() == 1 && c.is_precomputed()));
    }

    #[test]
    fn pruning_removes_old_empty_cluster() {
        let mut manager = Manager::new(config());
        load(&mut manager, &[&[(0, 3)]]);
        let mut stale = Cluster::new(2, 1);
        for _ in 0..defaults_min_age() {
            stale.update_age();
        }
        let stale = manager.corpus_mut().clusters.register(stale);
        let before = manager.corpus().cluster_count();

        let removed = manager.prune_clusters().unwrap();

        assert_eq!(removed, 1);
        assert!(!manager.corpus().clusters.contains(stale));
        assert_eq!(manager.corpus().cluster_count(), before - 1);
        assert_eq!(manager.corpus().check_invariants(), Ok(()));
    }

    #[test]
    fn pruned_members_are_reassigned() {
        let mut manager = Manager::new(config());
        load(&mut manager, &[&[(0, 3)]]);
        for cluster in manager.corpus_mut().clusters.iter_mut() {
            for _ in 0..defaults_min_age() {
                cluster.update_age();
            }
        }
        let old: Vec<ClusterId> = manager.corpus().clusters.ids();

        manager.prune_clusters().unwrap();

        let corpus = manager.corpus();
        assert_eq!(corpus.segment_count(), 1);
        assert!(corpus.clusters.ids().iter().all(|id| !old.contains(id)));
        assert_eq!(corpus.check_invariants(), Ok(()));
    }

    fn defaults_min_age() -> u64 {
        crate::defaults::PRUNE_MIN_AGE
    }

    #[test]
    fn sweeping_without_data_is_an_error() {
        let mut manager = Manager::new(config());
        let err = manager
            .gibbs_sampling(1, Path::new("/nonexistent"))
            .unwrap_err();
        assert!(matches!(err, DpsegError::EmptyCorpus));
    }
}
