//! Input listing: whitespace-separated pairs of index and feature paths.

use crate::error::{DpsegError, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPair {
    pub index: PathBuf,
    pub data: PathBuf,
}

impl InputPair {
    /// Utterance tag: the feature file name without directory or extension.
    pub fn tag(&self) -> String {
        self.data
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Parse a listing. A trailing unpaired path is ignored with a warning.
pub fn parse_listing(contents: &str) -> Vec<InputPair> {
    let tokens: Vec<&str> = contents.split_whitespace().collect();
    let mut pairs = tokens.chunks_exact(2);
    let listed = pairs
        .by_ref()
        .map(|pair| InputPair {
            index: PathBuf::from(pair[0]),
            data: PathBuf::from(pair[1]),
        })
        .collect();
    if let [leftover] = pairs.remainder() {
        log::warn!("Ignoring unpaired listing entry {}", leftover);
    }
    listed
}

pub fn read_listing(path: &Path) -> Result<Vec<InputPair>> {
    let contents = fs::read_to_string(path).map_err(|_| DpsegError::InputOpen {
        path: path.display().to_string(),
    })?;
    Ok(parse_listing(&contents))
}
