use serde::{Deserialize, Serialize};
use lochist_crypto::ContentHasher;
use lochist_types::{ObjectId, Timestamp};

use crate::error::{StoreError, StoreResult};

/// The kind of object stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Raw file content.
    Blob,
    /// Snapshot manifest: sorted entries mapping paths to blobs.
    Tree,
    /// Snapshot commit.
    Commit,
}

impl ObjectKind {
    /// One-byte tag used by the on-disk encoding.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Blob => 0,
            Self::Tree => 1,
            Self::Commit => 2,
        }
    }

    /// Parse the on-disk tag byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Blob),
            1 => Some(Self::Tree),
            2 => Some(Self::Commit),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Tree => write!(f, "tree"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// A stored object: kind tag + serialized data + cached size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    /// The type of this object.
    pub kind: ObjectKind,
    /// The serialized bytes of the object.
    pub data: Vec<u8>,
    /// The size of `data` in bytes.
    pub size: u64,
}

impl StoredObject {
    /// Create a new stored object from kind and data.
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self { kind, data, size }
    }

    /// Compute the content-addressed ID for this object.
    pub fn compute_id(&self) -> ObjectId {
        let hasher = match self.kind {
            ObjectKind::Blob => &ContentHasher::BLOB,
            ObjectKind::Tree => &ContentHasher::TREE,
            ObjectKind::Commit => &ContentHasher::COMMIT,
        };
        hasher.hash(&self.data)
    }

    fn expect_kind(&self, expected: ObjectKind) -> StoreResult<()> {
        if self.kind != expected {
            return Err(StoreError::CorruptObject {
                id: self.compute_id(),
                reason: format!("expected {expected}, got {}", self.kind),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Blob
// ---------------------------------------------------------------------------

/// Raw file content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn to_stored_object(&self) -> StoredObject {
        StoredObject::new(ObjectKind::Blob, self.data.clone())
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.expect_kind(ObjectKind::Blob)?;
        Ok(Self {
            data: obj.data.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// File mode for a tree entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryMode {
    /// Normal file (0o100644).
    Regular,
    /// Executable file (0o100755).
    Executable,
}

impl EntryMode {
    /// Octal mode value (for display).
    pub fn mode_bits(&self) -> u32 {
        match self {
            Self::Regular => 0o100644,
            Self::Executable => 0o100755,
        }
    }

    /// Derive the mode from file metadata.
    #[cfg(unix)]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::PermissionsExt;
        if meta.permissions().mode() & 0o111 != 0 {
            Self::Executable
        } else {
            Self::Regular
        }
    }

    /// Derive the mode from file metadata.
    #[cfg(not(unix))]
    pub fn from_metadata(_meta: &std::fs::Metadata) -> Self {
        Self::Regular
    }
}

impl std::fmt::Display for EntryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:06o}", self.mode_bits())
    }
}

/// A single file recorded in a snapshot manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// File mode.
    pub mode: EntryMode,
    /// Path relative to the project root, `/`-separated.
    pub path: String,
    /// Content-addressed ID of the blob.
    pub object_id: ObjectId,
    /// Uncompressed size of the file in bytes.
    pub size: u64,
}

impl TreeEntry {
    pub fn new(mode: EntryMode, path: impl Into<String>, object_id: ObjectId, size: u64) -> Self {
        Self {
            mode,
            path: path.into(),
            object_id,
            size,
        }
    }
}

impl PartialOrd for TreeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TreeEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.path.cmp(&other.path)
    }
}

/// Flat snapshot manifest.
///
/// Entries are keyed by their full relative path, sorted, and unique; a later
/// entry for the same path replaces an earlier one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Create a tree, sorting entries by path for deterministic hashing.
    pub fn new(entries: Vec<TreeEntry>) -> Self {
        let mut by_path = std::collections::BTreeMap::new();
        for entry in entries {
            by_path.insert(entry.path.clone(), entry);
        }
        Self {
            entries: by_path.into_values().collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        let data =
            serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredObject::new(ObjectKind::Tree, data))
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.expect_kind(ObjectKind::Tree)?;
        serde_json::from_slice(&obj.data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Look up an entry by path.
    pub fn get(&self, path: &str) -> Option<&TreeEntry> {
        self.entries
            .binary_search_by(|e| e.path.as_str().cmp(path))
            .ok()
            .map(|idx| &self.entries[idx])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the recorded file sizes.
    pub fn content_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

// ---------------------------------------------------------------------------
// CommitObject
// ---------------------------------------------------------------------------

/// A snapshot commit.
///
/// `summary` is the one-line label shown in history lists (e.g. `"Autosave"`);
/// `message` holds the full body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitObject {
    /// Root manifest of the snapshot.
    pub tree: ObjectId,
    /// Previous snapshot, if any. May refer to a pruned commit.
    pub parent: Option<ObjectId>,
    pub summary: String,
    pub message: String,
    pub timestamp: Timestamp,
}

impl CommitObject {
    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        let data =
            serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredObject::new(ObjectKind::Commit, data))
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.expect_kind(ObjectKind::Commit)?;
        serde_json::from_slice(&obj.data).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}
