//! Data model: frames, bounds, segments, clusters and the corpus that owns them.

pub mod arena;
pub mod bound;
pub mod cluster;
pub mod corpus;
pub mod frames;
pub mod segment;

pub use arena::{Arena, Handle};
pub use bound::{Bound, BoundId};
pub use cluster::{Cluster, ClusterId, Decoding, is_adjacent, is_reachable};
pub use corpus::{ClusterSet, Corpus};
pub use frames::FrameStore;
pub use segment::{CachedEvidence, Segment};

/// Stable handle to a live segment.
pub type SegmentId = Handle<Segment>;
