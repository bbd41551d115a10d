//! Minimal observation span between two candidate boundary sites.

use super::SegmentId;

/// Index of a bound in creation order. Never reused.
pub type BoundId = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    /// Creation-order index.
    pub index: BoundId,
    /// First frame within the utterance.
    pub start: usize,
    /// Last frame within the utterance (inclusive).
    pub end: usize,
    pub dim: usize,
    /// Offset of the first frame in the frame store.
    pub global_start: usize,
    /// Last bound of its utterance.
    pub utterance_end: bool,
    /// A boundary sits at this bound's right edge.
    pub phoneme_end: bool,
    /// Owning segment; `None` only while a boundary move is in flight.
    pub parent: Option<SegmentId>,
}

impl Bound {
    pub fn frame_count(&self) -> usize {
        self.end + 1 - self.start
    }

    /// Global frame offsets covered by this bound.
    pub fn frames(&self) -> std::ops::Range<usize> {
        self.global_start..self.global_start + self.frame_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_offset_into_the_store() {
        let bound = Bound {
            index: 3,
            start: 5,
            end: 9,
            dim: 2,
            global_start: 105,
            utterance_end: true,
            phoneme_end: true,
            parent: None,
        };
        assert_eq!(bound.frame_count(), 5);
        assert_eq!(bound.frames(), 105..110);
    }
}
