//! Indexed document model for DDR XML exports.
//!
//! A DDR export is parsed once with roxmltree and flattened into an arena of
//! element nodes. Nodes are addressed by index, subtrees are contiguous index
//! ranges (preorder construction), and every node records its byte position
//! in the source so reports can point at an XML line. Upward walks are
//! bounded: a reference site is never more than a couple dozen elements deep
//! inside its owning script or layout.

mod arena;

pub use arena::{Document, Node, NodeId, MAX_ANCESTOR_DEPTH};
