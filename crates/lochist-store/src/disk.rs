//! Loose-object store on the local filesystem.
//!
//! Layout under the store root:
//!
//! ```text
//! objects/
//!   ab/
//!     cdef0123...   # remaining 62 hex characters of the object id
//! ```
//!
//! Each object file is framed as:
//!
//! ```text
//! [1 byte: object kind tag]
//! [4 bytes: CRC32 of the compressed payload (little-endian u32)]
//! [N bytes: zstd-compressed object data]
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use lochist_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectKind, StoredObject};
use crate::traits::ObjectStore;

/// Header size: 1 byte kind + 4 bytes CRC.
const HEADER_SIZE: usize = 5;

/// Default zstd compression level.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Object store backed by loose files under `<root>/objects`.
#[derive(Debug)]
pub struct DiskObjectStore {
    objects_dir: PathBuf,
    compression_level: i32,
}

impl DiskObjectStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: &Path) -> StoreResult<Self> {
        Self::open_with_level(root, DEFAULT_COMPRESSION_LEVEL)
    }

    /// Open with an explicit zstd compression level.
    pub fn open_with_level(root: &Path, compression_level: i32) -> StoreResult<Self> {
        let objects_dir = root.join("objects");
        fs::create_dir_all(&objects_dir)?;
        Ok(Self {
            objects_dir,
            compression_level,
        })
    }

    /// Directory holding the fan-out subdirectories.
    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.objects_dir.join(&hex[..2]).join(&hex[2..])
    }

    fn decode(id: &ObjectId, raw: &[u8]) -> StoreResult<StoredObject> {
        if raw.len() < HEADER_SIZE {
            return Err(StoreError::CorruptObject {
                id: *id,
                reason: format!("truncated object file ({} bytes)", raw.len()),
            });
        }
        let kind = ObjectKind::from_tag(raw[0]).ok_or_else(|| StoreError::CorruptObject {
            id: *id,
            reason: format!("unknown kind tag {}", raw[0]),
        })?;
        let expected_crc = u32::from_le_bytes([raw[1], raw[2], raw[3], raw[4]]);
        let payload = &raw[HEADER_SIZE..];
        if crc32fast::hash(payload) != expected_crc {
            return Err(StoreError::CorruptObject {
                id: *id,
                reason: "CRC mismatch".into(),
            });
        }
        let data = zstd::decode_all(payload).map_err(|e| StoreError::CorruptObject {
            id: *id,
            reason: format!("decompression failed: {e}"),
        })?;
        let object = StoredObject::new(kind, data);
        let computed = object.compute_id();
        if computed != *id {
            return Err(StoreError::HashMismatch { id: *id, computed });
        }
        Ok(object)
    }

    fn encode(&self, object: &StoredObject) -> StoreResult<Vec<u8>> {
        let payload = zstd::encode_all(object.data.as_slice(), self.compression_level)?;
        let mut framed = Vec::with_capacity(HEADER_SIZE + payload.len());
        framed.push(object.kind.tag());
        framed.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        framed.extend_from_slice(&payload);
        Ok(framed)
    }
}

impl ObjectStore for DiskObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        let raw = match fs::read(self.object_path(id)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Self::decode(id, &raw).map(Some)
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let path = self.object_path(&id);
        if path.exists() {
            return Ok(id);
        }
        let dir = path.parent().unwrap_or(&self.objects_dir);
        fs::create_dir_all(dir)?;

        let framed = self.encode(object)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&framed)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(id = %id.short_hex(), kind = %object.kind, size = framed.len(), "object written");
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.object_path(id).is_file())
    }

    fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
        let path = self.object_path(id);
        match fs::remove_file(&path) {
            Ok(()) => {
                // Leave the fan-out directory if other objects still live there.
                if let Some(dir) = path.parent() {
                    let _ = fs::remove_dir(dir);
                }
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn stored_size(&self, id: &ObjectId) -> StoreResult<Option<u64>> {
        match fs::metadata(self.object_path(id)) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_ids(&self) -> StoreResult<Vec<ObjectId>> {
        let mut ids = Vec::new();
        for entry in WalkDir::new(&self.objects_dir).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| {
                StoreError::Io(io::Error::new(io::ErrorKind::Other, e.to_string()))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let fan_out = entry
                .path()
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let rest = entry.file_name().to_string_lossy();
            match ObjectId::from_hex(&format!("{fan_out}{rest}")) {
                Ok(id) => ids.push(id),
                Err(_) => warn!(path = ?entry.path(), "ignoring stray file in object store"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Blob, CommitObject, EntryMode, Tree, TreeEntry};
    use lochist_types::Timestamp;
    use tempfile::TempDir;

    fn setup() -> (TempDir, DiskObjectStore) {
        let dir = TempDir::new().unwrap();
        let store = DiskObjectStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn write_and_read_blob() {
        let (_dir, store) = setup();
        let obj = Blob::new(b"(kicad_pcb (version 20240108))".to_vec()).to_stored_object();
        let id = store.write(&obj).unwrap();
        assert_eq!(store.read(&id).unwrap().unwrap(), obj);
        assert!(store.exists(&id).unwrap());
    }

    #[test]
    fn objects_use_fan_out_layout() {
        let (dir, store) = setup();
        let id = store
            .write(&Blob::new(b"layout".to_vec()).to_stored_object())
            .unwrap();
        let hex = id.to_hex();
        assert!(dir.path().join("objects").join(&hex[..2]).join(&hex[2..]).is_file());
    }

    #[test]
    fn tree_and_commit_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let (tree_id, commit_id) = {
            let store = DiskObjectStore::open(dir.path()).unwrap();
            let blob = store.write(&Blob::new(b"x".to_vec()).to_stored_object()).unwrap();
            let tree = Tree::new(vec![TreeEntry::new(EntryMode::Regular, "a.sch", blob, 1)]);
            let tree_id = store.write(&tree.to_stored_object().unwrap()).unwrap();
            let commit = CommitObject {
                tree: tree_id,
                parent: None,
                summary: "Autosave".into(),
                message: "Autosave".into(),
                timestamp: Timestamp::from_millis(5),
            };
            let commit_id = store.write(&commit.to_stored_object().unwrap()).unwrap();
            (tree_id, commit_id)
        };
        let store = DiskObjectStore::open(dir.path()).unwrap();
        let commit = CommitObject::from_stored_object(&store.read(&commit_id).unwrap().unwrap())
            .unwrap();
        assert_eq!(commit.tree, tree_id);
        assert_eq!(store.list_ids().unwrap().len(), 3);
    }

    #[test]
    fn compressible_content_shrinks_on_disk() {
        let (_dir, store) = setup();
        let data = vec![b'a'; 64 * 1024];
        let id = store.write(&Blob::new(data).to_stored_object()).unwrap();
        assert!(store.stored_size(&id).unwrap().unwrap() < 4096);
    }

    #[test]
    fn corrupted_file_is_detected() {
        let (dir, store) = setup();
        let id = store
            .write(&Blob::new(b"precious".to_vec()).to_stored_object())
            .unwrap();
        let hex = id.to_hex();
        let path = dir.path().join("objects").join(&hex[..2]).join(&hex[2..]);
        let mut raw = fs::read(&path).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        fs::write(&path, raw).unwrap();
        let err = store.read(&id).unwrap_err();
        assert!(matches!(err, StoreError::CorruptObject { .. }));
    }

    #[test]
    fn delete_and_size_accounting() {
        let (_dir, store) = setup();
        let a = store.write(&Blob::new(b"one".to_vec()).to_stored_object()).unwrap();
        let b = store.write(&Blob::new(b"two".to_vec()).to_stored_object()).unwrap();
        let total = store.total_bytes().unwrap();
        let a_size = store.stored_size(&a).unwrap().unwrap();
        assert!(store.delete(&a).unwrap());
        assert!(!store.delete(&a).unwrap());
        assert_eq!(store.total_bytes().unwrap(), total - a_size);
        assert_eq!(store.list_ids().unwrap(), vec![b]);
        assert_eq!(store.stored_size(&a).unwrap(), None);
    }

    #[test]
    fn stray_files_are_ignored_by_listing() {
        let (dir, store) = setup();
        let stray_dir = dir.path().join("objects").join("zz");
        fs::create_dir_all(&stray_dir).unwrap();
        fs::write(stray_dir.join("not-an-object"), b"junk").unwrap();
        assert!(store.list_ids().unwrap().is_empty());
    }
}
