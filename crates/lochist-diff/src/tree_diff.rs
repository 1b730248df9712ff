//! Manifest-level diff: which files changed between two snapshots.
//!
//! Entries are compared by path. A deleted path and an added path that share
//! a blob id are reported as a rename.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use lochist_store::{EntryMode, ObjectStore, Tree, TreeEntry};
use lochist_types::ObjectId;

use crate::error::{DiffError, DiffResult};

/// The result of comparing two snapshot manifests.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TreeDiff {
    pub changes: Vec<TreeChange>,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Paths touched by the diff (new path for renames), sorted.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.changes.iter().map(TreeChange::path).collect();
        paths.sort_unstable();
        paths
    }
}

/// A single change between two manifests.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeChange {
    Added {
        path: String,
        new_id: ObjectId,
        mode: EntryMode,
    },
    Deleted {
        path: String,
        old_id: ObjectId,
        mode: EntryMode,
    },
    Modified {
        path: String,
        old_id: ObjectId,
        new_id: ObjectId,
        mode: EntryMode,
    },
    /// Same content under a new path.
    Renamed {
        old_path: String,
        new_path: String,
        id: ObjectId,
    },
    /// Same content, different file mode.
    ModeChanged {
        path: String,
        id: ObjectId,
        old_mode: EntryMode,
        new_mode: EntryMode,
    },
}

impl TreeChange {
    /// The path this change applies to (the new path for renames).
    pub fn path(&self) -> &str {
        match self {
            Self::Added { path, .. }
            | Self::Deleted { path, .. }
            | Self::Modified { path, .. }
            | Self::ModeChanged { path, .. } => path,
            Self::Renamed { new_path, .. } => new_path,
        }
    }
}

/// Compare two manifests stored in `store`.
///
/// `old_tree` of `None` compares against an empty manifest.
pub fn diff_trees(
    store: &dyn ObjectStore,
    old_tree: Option<&ObjectId>,
    new_tree: &ObjectId,
) -> DiffResult<TreeDiff> {
    let old = match old_tree {
        Some(id) => Some(load_tree(store, id)?),
        None => None,
    };
    let new = load_tree(store, new_tree)?;
    Ok(diff_tree_objects(old.as_ref(), &new))
}

/// Compare two manifests given directly.
pub fn diff_tree_objects(old_tree: Option<&Tree>, new_tree: &Tree) -> TreeDiff {
    let old = old_tree.map(|t| by_path(&t.entries)).unwrap_or_default();
    let new = by_path(&new_tree.entries);

    let mut changes = Vec::new();
    let mut deleted: Vec<&TreeEntry> = Vec::new();
    let mut added: Vec<&TreeEntry> = Vec::new();

    for (path, old_entry) in &old {
        match new.get(path) {
            Some(new_entry) if old_entry.object_id != new_entry.object_id => {
                changes.push(TreeChange::Modified {
                    path: (*path).to_string(),
                    old_id: old_entry.object_id,
                    new_id: new_entry.object_id,
                    mode: new_entry.mode,
                });
            }
            Some(new_entry) if old_entry.mode != new_entry.mode => {
                changes.push(TreeChange::ModeChanged {
                    path: (*path).to_string(),
                    id: old_entry.object_id,
                    old_mode: old_entry.mode,
                    new_mode: new_entry.mode,
                });
            }
            Some(_) => {}
            None => deleted.push(old_entry),
        }
    }
    for (path, new_entry) in &new {
        if !old.contains_key(path) {
            added.push(new_entry);
        }
    }

    let mut matched_adds = HashSet::new();
    for del in deleted {
        let rename = added
            .iter()
            .enumerate()
            .find(|(ai, add)| !matched_adds.contains(ai) && add.object_id == del.object_id);
        match rename {
            Some((ai, add)) => {
                matched_adds.insert(ai);
                changes.push(TreeChange::Renamed {
                    old_path: del.path.clone(),
                    new_path: add.path.clone(),
                    id: del.object_id,
                });
            }
            None => changes.push(TreeChange::Deleted {
                path: del.path.clone(),
                old_id: del.object_id,
                mode: del.mode,
            }),
        }
    }
    for (ai, add) in added.iter().enumerate() {
        if !matched_adds.contains(&ai) {
            changes.push(TreeChange::Added {
                path: add.path.clone(),
                new_id: add.object_id,
                mode: add.mode,
            });
        }
    }

    TreeDiff { changes }
}

fn by_path(entries: &[TreeEntry]) -> BTreeMap<&str, &TreeEntry> {
    entries.iter().map(|e| (e.path.as_str(), e)).collect()
}

fn load_tree(store: &dyn ObjectStore, id: &ObjectId) -> DiffResult<Tree> {
    let stored = store.read(id)?.ok_or(DiffError::ObjectNotFound(*id))?;
    Ok(Tree::from_stored_object(&stored)?)
}
