//! The [`RefStore`] trait defining the reference storage interface.

use lochist_types::ObjectId;

use crate::error::Result;
use crate::types::{CommitLog, Tag};

/// Storage backend for tags and the commit log of one project.
///
/// Implementations must be thread-safe (`Send + Sync`). Writes are atomic:
/// a reader never observes a half-written tag set or log.
pub trait RefStore: Send + Sync {
    /// Read a tag by name. Returns `Ok(None)` if it does not exist.
    fn read_tag(&self, name: &str) -> Result<Option<Tag>>;

    /// Create or move a tag.
    fn write_tag(&self, tag: &Tag) -> Result<()>;

    /// Delete a tag. Returns `Ok(true)` if it existed.
    fn delete_tag(&self, name: &str) -> Result<bool>;

    /// All tags, sorted by name.
    fn list_tags(&self) -> Result<Vec<Tag>>;

    /// The current commit log.
    fn log(&self) -> Result<CommitLog>;

    /// Replace the whole commit log (used by retention).
    fn replace_log(&self, log: &CommitLog) -> Result<()>;

    /// Append a snapshot to the log, making it head.
    fn append(&self, id: ObjectId) -> Result<()> {
        let mut log = self.log()?;
        log.push(id);
        self.replace_log(&log)
    }

    /// The most recent snapshot.
    fn head(&self) -> Result<Option<ObjectId>> {
        Ok(self.log()?.head())
    }

    /// Ids referenced by any tag.
    fn tagged_ids(&self) -> Result<Vec<ObjectId>> {
        Ok(self.list_tags()?.into_iter().map(|t| t.target).collect())
    }
}
