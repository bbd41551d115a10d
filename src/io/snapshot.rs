//! Binary model snapshots.
//!
//! Little-endian layout:
//!
//! ```text
//! magic "DPSG" | version u16 | segment count u32 | cluster count u32
//! per cluster:
//!   id u32 | member count u32 | state count u32 | dim u32
//!   transitions  state_num × (state_num + 1) f64, log space
//!   means        state_num × dim f64
//!   precisions   state_num × dim f64
//! ```

use crate::error::{DpsegError, Result};
use crate::model::{Cluster, ClusterId, Corpus};
use std::fs;
use std::path::Path;

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"DPSG";
pub const SNAPSHOT_VERSION: u16 = 1;

/// File name of the snapshot inside an iteration's results directory.
pub const SNAPSHOT_FILE: &str = "snapshot";

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRecord {
    pub id: ClusterId,
    pub member_count: u32,
    pub state_num: usize,
    pub dim: usize,
    pub trans: Vec<Vec<f64>>,
    pub means: Vec<Vec<f64>>,
    pub precisions: Vec<Vec<f64>>,
}

impl ClusterRecord {
    /// `None` for a cluster that was never registered.
    pub fn from_cluster(cluster: &Cluster) -> Option<Self> {
        let state_num = cluster.state_num();
        Some(Self {
            id: cluster.id()?,
            member_count: cluster.member_count() as u32,
            state_num,
            dim: cluster.dim(),
            trans: cluster.trans().to_vec(),
            means: (0..state_num).map(|s| cluster.mean(s).to_vec()).collect(),
            precisions: (0..state_num).map(|s| cluster.precision(s).to_vec()).collect(),
        })
    }

    /// Rebuild the cluster with its id and no members.
    pub fn to_cluster(&self) -> Cluster {
        let mut cluster = Cluster::new(self.state_num, self.dim);
        cluster.set_id(self.id);
        cluster.set_trans(self.trans.clone());
        for s in 0..self.state_num {
            cluster.set_emission(s, self.means[s].clone(), self.precisions[s].clone());
        }
        cluster
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub segment_count: u32,
    pub clusters: Vec<ClusterRecord>,
}

impl Snapshot {
    pub fn from_corpus(corpus: &Corpus) -> Self {
        Self {
            segment_count: corpus.segment_count() as u32,
            clusters: corpus
                .clusters
                .iter()
                .filter_map(ClusterRecord::from_cluster)
                .collect(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&SNAPSHOT_MAGIC);
        bytes.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&self.segment_count.to_le_bytes());
        bytes.extend_from_slice(&(self.clusters.len() as u32).to_le_bytes());

        for record in &self.clusters {
            bytes.extend_from_slice(&record.id.to_le_bytes());
            bytes.extend_from_slice(&record.member_count.to_le_bytes());
            bytes.extend_from_slice(&(record.state_num as u32).to_le_bytes());
            bytes.extend_from_slice(&(record.dim as u32).to_le_bytes());
            let values = record
                .trans
                .iter()
                .chain(&record.means)
                .chain(&record.precisions)
                .flatten();
            for value in values {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader { bytes, offset: 0 };
        if reader.take(4)? != SNAPSHOT_MAGIC {
            return Err(snapshot_error("invalid magic number"));
        }
        let version = reader.u16()?;
        if version != SNAPSHOT_VERSION {
            return Err(snapshot_error(format!("unsupported version {}", version)));
        }
        let segment_count = reader.u32()?;
        let cluster_count = reader.u32()?;

        let mut clusters = Vec::with_capacity(cluster_count as usize);
        for _ in 0..cluster_count {
            let id = reader.u32()?;
            let member_count = reader.u32()?;
            let state_num = reader.u32()? as usize;
            let dim = reader.u32()? as usize;
            if state_num == 0 || dim == 0 {
                return Err(snapshot_error(format!(
                    "cluster {} has {} states of dimension {}",
                    id, state_num, dim
                )));
            }
            let trans = reader.rows(state_num, state_num + 1)?;
            let means = reader.rows(state_num, dim)?;
            let precisions = reader.rows(state_num, dim)?;
            clusters.push(ClusterRecord {
                id,
                member_count,
                state_num,
                dim,
                trans,
                means,
                precisions,
            });
        }
        if reader.offset != bytes.len() {
            log::warn!(
                "Snapshot has {} trailing bytes",
                bytes.len() - reader.offset
            );
        }
        Ok(Self {
            segment_count,
            clusters,
        })
    }

    /// Write to `path`, creating parent directories as needed.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_bytes())?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|_| DpsegError::InputOpen {
            path: path.display().to_string(),
        })?;
        Self::from_bytes(&bytes)
    }
}

fn snapshot_error(message: impl Into<String>) -> DpsegError {
    DpsegError::Snapshot {
        message: message.into(),
    }
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.offset + len;
        let slice = self
            .bytes
            .get(self.offset..end)
            .ok_or_else(|| snapshot_error(format!("truncated at byte {}", self.offset)))?;
        self.offset = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f64(&mut self) -> Result<f64> {
        let b = self.take(8)?;
        Ok(f64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn rows(&mut self, rows: usize, cols: usize) -> Result<Vec<Vec<f64>>> {
        (0..rows)
            .map(|_| (0..cols).map(|_| self.f64()).collect::<Result<Vec<f64>>>())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_snapshot() -> Snapshot {
        let mut cluster = Cluster::new(2, 2);
        cluster.set_id(4);
        cluster.set_emission(1, vec![0.5, -0.5], vec![2.0, 3.0]);
        let record = ClusterRecord::from_cluster(&cluster).unwrap();
        Snapshot {
            segment_count: 12,
            clusters: vec![record],
        }
    }

    #[test]
    fn header_layout() {
        let bytes = sample_snapshot().to_bytes();
        assert_eq!(&bytes[0..4], b"DPSG");
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), SNAPSHOT_VERSION);
        assert_eq!(u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]), 12);
        // Header, four u32 fields, then 2×3 + 2×2 + 2×2 doubles.
        assert_eq!(bytes.len(), 14 + 16 + 14 * 8);
    }

    #[test]
    fn unreachable_transitions_survive_as_neg_inf() {
        let snapshot = sample_snapshot();
        let parsed = Snapshot::from_bytes(&snapshot.to_bytes()).unwrap();
        assert_eq!(parsed.clusters[0].trans[1][0], f64::NEG_INFINITY);
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn restored_cluster_keeps_id_and_parameters() {
        let cluster = sample_snapshot().clusters[0].to_cluster();
        assert_eq!(cluster.id(), Some(4));
        assert_eq!(cluster.member_count(), 0);
        assert_eq!(cluster.precision(1), &[2.0, 3.0]);
    }

    #[test]
    fn bad_magic_and_truncation_are_rejected() {
        let mut bytes = sample_snapshot().to_bytes();
        let truncated = &bytes[..bytes.len() - 3];
        assert!(matches!(
            Snapshot::from_bytes(truncated),
            Err(DpsegError::Snapshot { .. })
        ));
        bytes[0] = b'X';
        let err = Snapshot::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("invalid magic"));
    }

    #[test]
    fn write_creates_the_iteration_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("200").join(SNAPSHOT_FILE);
        sample_snapshot().write(&path).unwrap();
        assert_eq!(Snapshot::read(&path).unwrap(), sample_snapshot());
    }
}
