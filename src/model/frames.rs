//! Flat storage for every loaded feature frame.

/// Owns all acoustic frames, addressed by global frame offset.
///
/// Frames are appended in load order and never change afterwards. Bounds
/// and segments refer to them by offset only.
#[derive(Debug, Clone)]
pub struct FrameStore {
    dim: usize,
    data: Vec<f32>,
}

impl FrameStore {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of frames stored.
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append `values.len() / dim` frames and return the offset of the first.
    ///
    /// Trailing values that do not fill a whole frame are dropped.
    pub fn extend(&mut self, values: &[f32]) -> usize {
        let start = self.len();
        let whole = values.len() - values.len() % self.dim.max(1);
        self.data.extend_from_slice(&values[..whole]);
        start
    }

    /// Frame at global offset `index`.
    ///
    /// Panics if `index` is out of range.
    pub fn frame(&self, index: usize) -> &[f32] {
        &self.data[index * self.dim..(index + 1) * self.dim]
    }
}
