//! End-to-end tests: load fixtures from disk, sweep, persist and resume.

use dpseg::config::{Config, PriorConfig, TrainingConfig};
use dpseg::io::{self, Snapshot};
use dpseg::{DpsegError, Manager};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const DIM: usize = 2;

fn config(h0: f64) -> Config {
    Config {
        prior: PriorConfig {
            dim: DIM,
            state_num: 2,
            h0,
            ..PriorConfig::default()
        },
        training: TrainingConfig {
            iterations: 4,
            snapshot_interval: 2,
            seed: Some(11),
            ..TrainingConfig::default()
        },
    }
}

/// Write an index file and a feature file for one utterance; returns the
/// listing line.
fn write_utterance(dir: &Path, tag: &str, index: &str, frames: usize) -> String {
    let index_path = dir.join(format!("{}.phn", tag));
    let data_path = dir.join(format!("{}.raw", tag));
    fs::write(&index_path, index).unwrap();
    let bytes: Vec<u8> = (0..frames * DIM)
        .map(|i| {
            let level = if i < frames { -1.0f32 } else { 1.0 };
            level + (i % 3) as f32 * 0.1
        })
        .flat_map(|v| v.to_le_bytes())
        .collect();
    fs::write(&data_path, bytes).unwrap();
    format!("{} {}\n", index_path.display(), data_path.display())
}

fn write_listing(dir: &Path, lines: &[String]) -> PathBuf {
    let path = dir.join("data.list");
    fs::write(&path, lines.concat()).unwrap();
    path
}

fn spans(manager: &Manager) -> Vec<(usize, usize)> {
    let corpus = manager.corpus();
    corpus
        .ordered_segments()
        .into_iter()
        .filter_map(|id| corpus.segments.get(id))
        .map(|segment| corpus.segment_span(segment))
        .collect()
}

#[test]
fn forced_boundary_gives_two_segments() {
    let dir = TempDir::new().unwrap();
    let line = write_utterance(dir.path(), "utt1", "10\n0 4\n5 9\n", 10);
    let listing = write_listing(dir.path(), &[line]);

    let mut manager = Manager::new(config(0.0));
    assert_eq!(manager.load_bounds(&listing).unwrap(), 1);

    let corpus = manager.corpus();
    assert_eq!(spans(&manager), vec![(0, 4), (5, 9)]);
    assert_eq!(corpus.segment_count(), 2);
    assert!(corpus.cluster_count() >= 1);
    assert!(corpus.segments.iter().all(|(_, s)| s.cluster.is_some()));
    assert_eq!(corpus.check_invariants(), Ok(()));
}

#[test]
fn labeled_boundary_with_unknown_cluster_is_sampled() {
    let dir = TempDir::new().unwrap();
    let line = write_utterance(dir.path(), "utt1", "10\n0 4 42\n5 9 -1\n", 10);
    let listing = write_listing(dir.path(), &[line]);

    let mut manager = Manager::new(config(1.0));
    manager.load_labeled(&listing).unwrap();

    assert_eq!(spans(&manager), vec![(0, 4), (5, 9)]);
    assert!(!manager.corpus().clusters.contains(42));
    assert_eq!(manager.corpus().check_invariants(), Ok(()));
}

#[test]
fn never_splitting_prior_gives_one_segment_per_utterance() {
    let dir = TempDir::new().unwrap();
    let lines = vec![
        write_utterance(dir.path(), "a", "9\n0 2\n3 5\n6 8\n", 9),
        write_utterance(dir.path(), "b", "4\n0 3\n", 4),
    ];
    let listing = write_listing(dir.path(), &lines);

    let mut manager = Manager::new(config(1.0));
    manager.load_bounds(&listing).unwrap();

    assert_eq!(spans(&manager), vec![(0, 8), (0, 3)]);
    assert_eq!(manager.batch_groups(), &[3, 4]);
}

#[test]
fn trailing_partial_group_gets_a_watermark() {
    let dir = TempDir::new().unwrap();
    let lines: Vec<String> = ["a", "b", "c"]
        .iter()
        .map(|tag| write_utterance(dir.path(), tag, "4\n0 1\n2 3\n", 4))
        .collect();
    let listing = write_listing(dir.path(), &lines);
    let mut config = config(0.5);
    config.training.group_size = 2;

    let mut manager = Manager::new(config);
    manager.load_bounds(&listing).unwrap();

    assert_eq!(manager.batch_groups(), &[4, 6]);
}

#[test]
fn training_writes_labels_and_snapshots() {
    let dir = TempDir::new().unwrap();
    let lines = vec![
        write_utterance(dir.path(), "a", "12\n0 3\n4 7\n8 11\n", 12),
        write_utterance(dir.path(), "b", "8\n0 3\n4 7\n", 8),
    ];
    let listing = write_listing(dir.path(), &lines);
    let results = dir.path().join("results");

    let mut manager = Manager::new(config(0.5));
    manager.load_bounds(&listing).unwrap();
    manager.gibbs_sampling(4, &results).unwrap();

    let corpus = manager.corpus();
    assert_eq!(corpus.check_invariants(), Ok(()));
    assert!(corpus.clusters.iter().all(|c| c.member_count() > 0));

    for sweep in ["2", "4"] {
        let out = results.join(sweep);
        assert!(out.join("a").exists(), "labels missing for sweep {}", sweep);
        assert!(out.join("b").exists());
        let snapshot = Snapshot::read(&out.join(io::SNAPSHOT_FILE)).unwrap();
        assert!(!snapshot.clusters.is_empty());
    }
    let labels = fs::read_to_string(results.join("4").join("a")).unwrap();
    assert!(labels.starts_with("12\n"));
    assert!(labels.trim_end().ends_with(|c: char| c.is_ascii_digit()));

    let snapshot = Snapshot::read(&results.join("4").join(io::SNAPSHOT_FILE)).unwrap();
    assert_eq!(snapshot.segment_count as usize, corpus.segment_count());
    assert_eq!(snapshot.clusters.len(), corpus.cluster_count());
}

#[test]
fn same_seed_gives_same_segmentation() {
    let dir = TempDir::new().unwrap();
    let lines = vec![write_utterance(dir.path(), "a", "12\n0 3\n4 7\n8 11\n", 12)];
    let listing = write_listing(dir.path(), &lines);

    let run = |out: &str| {
        let mut manager = Manager::new(config(0.5));
        manager.load_bounds(&listing).unwrap();
        manager.gibbs_sampling(3, &dir.path().join(out)).unwrap();
        io::collect_labels(manager.corpus())
    };

    assert_eq!(run("first"), run("second"));
}

#[test]
fn resume_restores_labeled_partition() {
    let dir = TempDir::new().unwrap();
    let lines = vec![write_utterance(dir.path(), "a", "12\n0 3\n4 7\n8 11\n", 12)];
    let listing = write_listing(dir.path(), &lines);
    let results = dir.path().join("results");

    let mut first = Manager::new(config(0.5));
    first.load_bounds(&listing).unwrap();
    first.gibbs_sampling(2, &results).unwrap();
    let trained = io::collect_labels(first.corpus());

    // The label output doubles as a labeled index file.
    let sweep = results.join("2");
    let resume_list = dir.path().join("resume.list");
    fs::write(
        &resume_list,
        format!(
            "{} {}\n",
            sweep.join("a").display(),
            dir.path().join("a.raw").display()
        ),
    )
    .unwrap();

    let mut resumed = Manager::new(config(0.5));
    resumed
        .load_snapshot(&sweep.join(io::SNAPSHOT_FILE), &resume_list, 0)
        .unwrap();

    assert_eq!(io::collect_labels(resumed.corpus()), trained);
    assert_eq!(resumed.corpus().check_invariants(), Ok(()));
    resumed.gibbs_sampling(2, &dir.path().join("resumed")).unwrap();
}

#[test]
fn snapshot_threshold_drops_small_clusters() {
    let dir = TempDir::new().unwrap();
    let lines = vec![write_utterance(dir.path(), "a", "12\n0 3\n4 7\n8 11\n", 12)];
    let listing = write_listing(dir.path(), &lines);
    let results = dir.path().join("results");

    let mut first = Manager::new(config(0.0));
    first.load_bounds(&listing).unwrap();
    first.write_results(&results, 0).unwrap();
    let path = results.join("0").join(io::SNAPSHOT_FILE);
    let snapshot = Snapshot::read(&path).unwrap();
    let largest = snapshot
        .clusters
        .iter()
        .map(|c| c.member_count as usize)
        .max()
        .unwrap();

    let mut resumed = Manager::new(config(0.0));
    assert_eq!(resumed.load_model(&path, largest).unwrap(), 0);
    assert_eq!(
        resumed.load_model(&path, 0).unwrap(),
        snapshot.clusters.len()
    );
    assert!(resumed.corpus().clusters.iter().all(|c| c.member_count() == 0));
}

#[test]
fn missing_feature_file_fails_the_load() {
    let dir = TempDir::new().unwrap();
    let index = dir.path().join("a.phn");
    fs::write(&index, "4\n0 3\n").unwrap();
    let listing = dir.path().join("data.list");
    fs::write(
        &listing,
        format!("{} {}\n", index.display(), dir.path().join("a.raw").display()),
    )
    .unwrap();

    let mut manager = Manager::new(config(0.5));
    let err = manager.load_bounds(&listing).unwrap_err();
    assert!(matches!(err, DpsegError::InputOpen { .. }));
}

#[test]
fn empty_listing_is_rejected() {
    let dir = TempDir::new().unwrap();
    let listing = write_listing(dir.path(), &[]);
    let mut manager = Manager::new(config(0.5));
    assert!(matches!(
        manager.load_bounds(&listing),
        Err(DpsegError::EmptyCorpus)
    ));
}
