//! In-memory reference store for testing and ephemeral use.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::{RefError, Result};
use crate::names::validate_tag_name;
use crate::traits::RefStore;
use crate::types::{CommitLog, Tag};

/// An in-memory implementation of [`RefStore`].
///
/// Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    tags: RwLock<BTreeMap<String, Tag>>,
    log: RwLock<CommitLog>,
}

impl InMemoryRefStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(e: impl std::fmt::Display) -> RefError {
    RefError::Serialization(format!("lock poisoned: {e}"))
}

impl RefStore for InMemoryRefStore {
    fn read_tag(&self, name: &str) -> Result<Option<Tag>> {
        let tags = self.tags.read().map_err(poisoned)?;
        Ok(tags.get(name).cloned())
    }

    fn write_tag(&self, tag: &Tag) -> Result<()> {
        validate_tag_name(&tag.name)?;
        let mut tags = self.tags.write().map_err(poisoned)?;
        tags.insert(tag.name.clone(), tag.clone());
        Ok(())
    }

    fn delete_tag(&self, name: &str) -> Result<bool> {
        let mut tags = self.tags.write().map_err(poisoned)?;
        Ok(tags.remove(name).is_some())
    }

    fn list_tags(&self) -> Result<Vec<Tag>> {
        let tags = self.tags.read().map_err(poisoned)?;
        Ok(tags.values().cloned().collect())
    }

    fn log(&self) -> Result<CommitLog> {
        let log = self.log.read().map_err(poisoned)?;
        Ok(log.clone())
    }

    fn replace_log(&self, new_log: &CommitLog) -> Result<()> {
        let mut log = self.log.write().map_err(poisoned)?;
        *log = new_log.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lochist_types::ObjectId;

    fn oid(b: u8) -> ObjectId {
        ObjectId::from_hash([b; 32])
    }

    #[test]
    fn read_nonexistent_tag_returns_none() {
        let store = InMemoryRefStore::new();
        assert!(store.read_tag("project").unwrap().is_none());
    }

    #[test]
    fn retagging_moves_the_pointer() {
        let store = InMemoryRefStore::new();
        store.write_tag(&Tag::new("project", oid(1))).unwrap();
        store.write_tag(&Tag::new("project", oid(2))).unwrap();
        let tags = store.list_tags().unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].target, oid(2));
    }

    #[test]
    fn invalid_tag_is_rejected() {
        let store = InMemoryRefStore::new();
        let err = store.write_tag(&Tag::new("a/b", oid(1))).unwrap_err();
        assert!(matches!(err, RefError::InvalidTagName { .. }));
    }

    #[test]
    fn delete_tag() {
        let store = InMemoryRefStore::new();
        store.write_tag(&Tag::new("Save", oid(1))).unwrap();
        assert!(store.delete_tag("Save").unwrap());
        assert!(!store.delete_tag("Save").unwrap());
    }

    #[test]
    fn append_advances_head() {
        let store = InMemoryRefStore::new();
        assert!(store.head().unwrap().is_none());
        store.append(oid(1)).unwrap();
        store.append(oid(2)).unwrap();
        assert_eq!(store.head().unwrap(), Some(oid(2)));
        assert_eq!(store.log().unwrap().len(), 2);
    }

    #[test]
    fn tags_sorted_by_name() {
        let store = InMemoryRefStore::new();
        store.write_tag(&Tag::new("zeta", oid(1))).unwrap();
        store.write_tag(&Tag::new("alpha", oid(2))).unwrap();
        let names: Vec<_> = store.list_tags().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(store.tagged_ids().unwrap(), vec![oid(2), oid(1)]);
    }
}
