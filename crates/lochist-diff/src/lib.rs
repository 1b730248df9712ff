//! Snapshot comparison for lochist.
//!
//! # Key Types
//!
//! - [`TreeDiff`] / [`TreeChange`] -- which files were added, deleted,
//!   modified, or renamed between two snapshot manifests
//! - [`BlobDiff`] / [`DiffHunk`] / [`DiffLine`] -- line-level diff of one
//!   file's contents

pub mod blob_diff;
pub mod error;
pub mod tree_diff;

pub use blob_diff::{diff_blobs, BlobDiff, DiffHunk, DiffLine};
pub use error::{DiffError, DiffResult};
pub use tree_diff::{diff_tree_objects, diff_trees, TreeChange, TreeDiff};
