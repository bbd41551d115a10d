//! Class-label output, one file per utterance.
//!
//! Layout matches a labeled index file: the utterance frame total, then
//! `start end cluster_id` per segment. A results directory can therefore
//! seed a resume.

use crate::error::Result;
use crate::model::Corpus;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtteranceLabels {
    pub tag: String,
    pub total_frames: usize,
    /// `(start, end, cluster)` per segment, in order.
    pub segments: Vec<(usize, usize, i64)>,
}

impl UtteranceLabels {
    pub fn render(&self) -> String {
        let mut out = format!("{}\n", self.total_frames);
        for (start, end, cluster) in &self.segments {
            out.push_str(&format!("{} {} {}\n", start, end, cluster));
        }
        out
    }
}

/// Current segmentation grouped by utterance, in corpus order.
pub fn collect_labels(corpus: &Corpus) -> Vec<UtteranceLabels> {
    let mut utterances = Vec::new();
    let mut current: Option<UtteranceLabels> = None;
    for id in corpus.ordered_segments() {
        let Some(segment) = corpus.segments.get(id) else {
            continue;
        };
        let (start, end) = corpus.segment_span(segment);
        let cluster = segment.cluster.map_or(-1, i64::from);
        let labels = current.get_or_insert_with(|| UtteranceLabels {
            tag: segment.tag.clone(),
            total_frames: 0,
            segments: Vec::new(),
        });
        labels.segments.push((start, end, cluster));
        labels.total_frames = end + 1;
        if corpus.bounds[segment.last_bound()].utterance_end {
            utterances.extend(current.take());
        }
    }
    utterances.extend(current);
    utterances
}

/// Write one label file per utterance into `dir`, creating it if needed.
///
/// Returns the number of files written.
pub fn write_labels(corpus: &Corpus, dir: &Path) -> Result<usize> {
    fs::create_dir_all(dir)?;
    let utterances = collect_labels(corpus);
    for utterance in &utterances {
        fs::write(dir.join(&utterance.tag), utterance.render())?;
    }
    log::debug!("Wrote {} label files to {}", utterances.len(), dir.display());
    Ok(utterances.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cluster, Segment};
    use tempfile::TempDir;

    fn labeled_corpus() -> Corpus {
        let mut corpus = Corpus::new(1);
        corpus.push_bound(0, 4, false, &[0.0; 5]);
        corpus.push_bound(5, 9, true, &[0.0; 5]);
        corpus.push_bound(0, 2, true, &[0.0; 3]);
        let c = corpus.clusters.register(Cluster::new(1, 1));
        for (tag, bounds) in [("a", vec![0]), ("a", vec![1]), ("b", vec![2])] {
            let last = bounds[bounds.len() - 1];
            corpus.bounds[last].phoneme_end = true;
            let mut segment = Segment::new(tag, bounds);
            segment.cluster = Some(c);
            let id = corpus.insert_segment(segment);
            if let Some(cluster) = corpus.clusters.get_mut(c) {
                cluster.append_member(id);
            }
        }
        corpus
    }

    #[test]
    fn groups_segments_by_utterance() {
        let labels = collect_labels(&labeled_corpus());
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].tag, "a");
        assert_eq!(labels[0].total_frames, 10);
        assert_eq!(labels[0].segments, vec![(0, 4, 0), (5, 9, 0)]);
        assert_eq!(labels[1].render(), "3\n0 2 0\n");
    }

    #[test]
    fn writes_one_file_per_utterance() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("100");
        let written = write_labels(&labeled_corpus(), &out).unwrap();

        assert_eq!(written, 2);
        assert_eq!(fs::read_to_string(out.join("a")).unwrap(), "10\n0 4 0\n5 9 0\n");
    }
}
