//! Index files.
//!
//! The first token is the utterance's total frame count. Then come
//! `start end` pairs (or `start end label` triples for labeled data) until
//! a span ends on the last frame. Spans with `end < start` are empty and
//! dropped.

use crate::defaults::UNLABELED;
use crate::error::{DpsegError, Result};
use std::fs;
use std::path::Path;

/// A non-empty span of utterance frames, `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub start: usize,
    pub end: usize,
    /// Cluster label, [`UNLABELED`] when absent.
    pub label: i64,
}

impl IndexEntry {
    pub fn frame_count(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn is_labeled(&self) -> bool {
        self.label != UNLABELED
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFile {
    pub total_frames: usize,
    pub entries: Vec<IndexEntry>,
}

pub fn parse_index(contents: &str, labeled: bool, path: &Path) -> Result<IndexFile> {
    let format_error = |message: String| DpsegError::IndexFormat {
        path: path.display().to_string(),
        message,
    };
    let mut tokens = contents.split_whitespace();
    let mut next = |what: &str| -> Result<i64> {
        let token = tokens
            .next()
            .ok_or_else(|| format_error(format!("missing {}", what)))?;
        token
            .parse::<i64>()
            .map_err(|_| format_error(format!("{} {:?} is not an integer", what, token)))
    };

    let total = next("total frame count")?;
    if total <= 0 {
        return Err(format_error(format!(
            "total frame count {} is not positive",
            total
        )));
    }
    let last_frame = total - 1;

    let mut entries = Vec::new();
    loop {
        let start = next("start frame")?;
        let end = next("end frame")?;
        let label = if labeled {
            next("cluster label")?
        } else {
            UNLABELED
        };
        if start < 0 || end > last_frame {
            return Err(format_error(format!(
                "span {} {} lies outside 0..{}",
                start, end, total
            )));
        }
        if end >= start {
            entries.push(IndexEntry {
                start: start as usize,
                end: end as usize,
                label,
            });
        } else {
            log::debug!("Skipping empty span {} {} in {}", start, end, path.display());
        }
        if end == last_frame {
            break;
        }
    }
    Ok(IndexFile {
        total_frames: total as usize,
        entries,
    })
}

pub fn read_index(path: &Path, labeled: bool) -> Result<IndexFile> {
    let contents = fs::read_to_string(path).map_err(|_| DpsegError::InputOpen {
        path: path.display().to_string(),
    })?;
    parse_index(&contents, labeled, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(contents: &str, labeled: bool) -> Result<IndexFile> {
        parse_index(contents, labeled, Path::new("utt.phn"))
    }

    #[test]
    fn reads_until_the_last_frame() {
        let index = parse("10\n0 4\n5 9\n99 99\n", false).unwrap();
        assert_eq!(index.total_frames, 10);
        assert_eq!(
            index.entries,
            vec![
                IndexEntry { start: 0, end: 4, label: UNLABELED },
                IndexEntry { start: 5, end: 9, label: UNLABELED },
            ]
        );
    }

    #[test]
    fn labeled_triples() {
        let index = parse("6 0 2 7 3 5 -1", true).unwrap();
        assert_eq!(index.entries[0].label, 7);
        assert!(index.entries[0].is_labeled());
        assert!(!index.entries[1].is_labeled());
    }

    #[test]
    fn empty_spans_are_dropped() {
        let index = parse("4\n0 1\n2 1\n2 3\n", false).unwrap();
        assert_eq!(index.entries.len(), 2);
        assert_eq!(index.entries[1].frame_count(), 2);
    }

    #[test]
    fn truncated_index_is_rejected() {
        let err = parse("10\n0 4\n", false).unwrap_err();
        assert!(matches!(err, DpsegError::IndexFormat { .. }));
        assert!(err.to_string().contains("missing start frame"));
    }

    #[test]
    fn span_past_the_total_is_rejected() {
        assert!(parse("5\n0 7\n", false).is_err());
        assert!(parse("0\n", false).is_err());
        assert!(parse("5\n0 x\n", false).is_err());
    }
}
