//! On-disk formats: input listings, index/feature pairs, class labels and
//! model snapshots.

pub mod index;
pub mod labels;
pub mod listing;
pub mod snapshot;

pub use index::{IndexEntry, IndexFile, parse_index, read_index};
pub use labels::{UtteranceLabels, collect_labels, write_labels};
pub use listing::{InputPair, read_listing};
pub use snapshot::{ClusterRecord, SNAPSHOT_FILE, SNAPSHOT_MAGIC, SNAPSHOT_VERSION, Snapshot};

use crate::error::{DpsegError, Result};
use std::fs;
use std::path::Path;

/// Read a raw feature file of little-endian `f32` values.
pub fn read_features(path: &Path) -> Result<Vec<f32>> {
    let bytes = fs::read(path).map_err(|_| DpsegError::InputOpen {
        path: path.display().to_string(),
    })?;
    if bytes.len() % 4 != 0 {
        return Err(DpsegError::FeatureData {
            path: path.display().to_string(),
            message: format!("{} bytes is not a whole number of floats", bytes.len()),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// One utterance's index entries and feature values.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub tag: String,
    pub index: IndexFile,
    pub values: Vec<f32>,
    dim: usize,
}

impl Utterance {
    pub fn new(tag: impl Into<String>, index: IndexFile, values: Vec<f32>, dim: usize) -> Self {
        Self {
            tag: tag.into(),
            index,
            values,
            dim,
        }
    }

    /// Read and cross-check an index/feature pair.
    pub fn load(pair: &InputPair, dim: usize, labeled: bool) -> Result<Self> {
        let index = read_index(&pair.index, labeled)?;
        let values = read_features(&pair.data)?;
        let needed: usize = index.entries.iter().map(|e| e.frame_count() * dim).sum();
        if values.len() < needed {
            return Err(DpsegError::FeatureData {
                path: pair.data.display().to_string(),
                message: format!(
                    "index needs {} values of dimension {}, file holds {}",
                    needed,
                    dim,
                    values.len()
                ),
            });
        }
        if values.len() > needed {
            log::warn!(
                "{} has {} trailing values not covered by {}",
                pair.data.display(),
                values.len() - needed,
                pair.index.display()
            );
        }
        Ok(Self {
            tag: pair.tag(),
            index,
            values,
            dim,
        })
    }

    /// Index entries paired with their feature values, in file order.
    pub fn spans(&self) -> impl Iterator<Item = (&IndexEntry, &[f32])> {
        let mut offset = 0;
        self.index.entries.iter().map(move |entry| {
            let len = entry.frame_count() * self.dim;
            let values = &self.values[offset..offset + len];
            offset += len;
            (entry, values)
        })
    }
}
