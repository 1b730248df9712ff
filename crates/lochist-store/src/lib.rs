//! Content-addressed object storage for lochist.
//!
//! This crate implements a hash-keyed object store analogous to git's
//! `.git/objects/` directory. File contents, snapshot manifests, and snapshot
//! commits are stored as immutable objects identified by their BLAKE3 hash
//! (domain-separated by object kind).
//!
//! # Object Types
//!
//! - [`Blob`] -- raw file content
//! - [`Tree`] -- manifest mapping relative paths to blob ids
//! - [`CommitObject`] -- a snapshot: tree, parent, summary, message, timestamp
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`DiskObjectStore`] -- loose, zstd-compressed object files under a
//!   project's hidden history directory
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. Write-then-link: write the object, then update references.
//! 3. Deletion exists only for retention sweeps.
//! 4. The store never interprets object contents.

pub mod disk;
pub mod error;
pub mod memory;
pub mod object;
pub mod traits;

pub use disk::DiskObjectStore;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use object::{Blob, CommitObject, EntryMode, ObjectKind, StoredObject, Tree, TreeEntry};
pub use traits::ObjectStore;
