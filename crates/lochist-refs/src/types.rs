//! Core reference types.

use serde::{Deserialize, Serialize};
use lochist_types::{ObjectId, Timestamp};

/// A named, movable pointer to a snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name (e.g. "project", "Declined restore").
    pub name: String,
    /// Commit id of the tagged snapshot.
    pub target: ObjectId,
    /// When the tag was last moved.
    pub updated: Timestamp,
}

impl Tag {
    pub fn new(name: impl Into<String>, target: ObjectId) -> Self {
        Self {
            name: name.into(),
            target,
            updated: Timestamp::now(),
        }
    }

    /// Canonical ref name (e.g. "refs/tags/project").
    pub fn canonical_name(&self) -> String {
        format!("refs/tags/{}", self.name)
    }
}

/// Ordered list of retained snapshot ids, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitLog {
    entries: Vec<ObjectId>,
}

impl CommitLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<ObjectId>) -> Self {
        Self { entries }
    }

    /// The most recent snapshot.
    pub fn head(&self) -> Option<ObjectId> {
        self.entries.last().copied()
    }

    pub fn push(&mut self, id: ObjectId) {
        self.entries.push(id);
    }

    /// Remove `id` from the log. Returns `true` if it was present.
    pub fn remove(&mut self, id: &ObjectId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e != id);
        self.entries.len() != before
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.entries.contains(id)
    }

    /// Entries oldest first.
    pub fn entries(&self) -> &[ObjectId] {
        &self.entries
    }

    /// Entries newest first.
    pub fn newest_first(&self) -> impl Iterator<Item = &ObjectId> {
        self.entries.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
