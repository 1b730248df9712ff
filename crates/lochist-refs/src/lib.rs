//! Reference management for lochist project history.
//!
//! References are the human-readable entry points into a project's snapshot
//! history.
//!
//! # Architecture
//!
//! - The **commit log** is the ordered list of retained snapshot ids, oldest
//!   first. Its last entry is **head**.
//! - **Tags** are named, movable pointers to a snapshot (e.g. `"project"`
//!   marks the snapshot matching the last explicit save). At most one tag
//!   exists per name; writing a tag again moves it.
//!
//! # Modules
//!
//! - [`error`] -- Error types for ref operations
//! - [`types`] -- [`Tag`] and [`CommitLog`]
//! - [`traits`] -- The [`RefStore`] trait defining the storage interface
//! - [`names`] -- Tag name validation
//! - [`memory`] -- In-memory [`InMemoryRefStore`] for tests
//! - [`file`] -- JSON-file backed [`FileRefStore`]

pub mod error;
pub mod file;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use error::{RefError, Result};
pub use file::FileRefStore;
pub use memory::InMemoryRefStore;
pub use names::validate_tag_name;
pub use traits::RefStore;
pub use types::{CommitLog, Tag};
