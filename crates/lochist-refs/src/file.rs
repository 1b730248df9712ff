//! JSON-file backed reference store.
//!
//! Two files live under the store root:
//!
//! ```text
//! refs.json   # { "<tag name>": Tag, ... }
//! log.json    # { "entries": [ObjectId, ...] }   oldest first
//! ```
//!
//! Every write replaces the whole file through a temporary file and an atomic
//! rename. The files are re-read on every access so two handles on the same
//! project observe each other's writes.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{RefError, Result};
use crate::names::validate_tag_name;
use crate::traits::RefStore;
use crate::types::{CommitLog, Tag};

const REFS_FILE: &str = "refs.json";
const LOG_FILE: &str = "log.json";

/// File-backed implementation of [`RefStore`].
#[derive(Debug)]
pub struct FileRefStore {
    root: PathBuf,
    /// Serialises read-modify-write cycles from this handle.
    write_lock: Mutex<()>,
}

impl FileRefStore {
    /// Open (creating the directory if needed) a ref store rooted at `root`.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    fn refs_path(&self) -> PathBuf {
        self.root.join(REFS_FILE)
    }

    fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }

    fn load<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&raw).map_err(|e| RefError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn store<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let data = serde_json::to_vec_pretty(value)
            .map_err(|e| RefError::Serialization(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| RefError::Io(e.error))?;
        debug!(path = %path.display(), bytes = data.len(), "refs persisted");
        Ok(())
    }

    fn load_tags(&self) -> Result<BTreeMap<String, Tag>> {
        Self::load(&self.refs_path())
    }
}

impl RefStore for FileRefStore {
    fn read_tag(&self, name: &str) -> Result<Option<Tag>> {
        Ok(self.load_tags()?.remove(name))
    }

    fn write_tag(&self, tag: &Tag) -> Result<()> {
        validate_tag_name(&tag.name)?;
        let _guard = self.write_lock.lock().map_err(|e| {
            RefError::Serialization(format!("lock poisoned: {e}"))
        })?;
        let mut tags = self.load_tags()?;
        tags.insert(tag.name.clone(), tag.clone());
        self.store(&self.refs_path(), &tags)
    }

    fn delete_tag(&self, name: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().map_err(|e| {
            RefError::Serialization(format!("lock poisoned: {e}"))
        })?;
        let mut tags = self.load_tags()?;
        if tags.remove(name).is_none() {
            return Ok(false);
        }
        self.store(&self.refs_path(), &tags)?;
        Ok(true)
    }

    fn list_tags(&self) -> Result<Vec<Tag>> {
        Ok(self.load_tags()?.into_values().collect())
    }

    fn log(&self) -> Result<CommitLog> {
        Self::load(&self.log_path())
    }

    fn replace_log(&self, log: &CommitLog) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|e| {
            RefError::Serialization(format!("lock poisoned: {e}"))
        })?;
        self.store(&self.log_path(), log)
    }
}
