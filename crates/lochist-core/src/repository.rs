//! One project's history: object store, tags, and commit log under
//! `<project>/.history/`.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use ignore::WalkBuilder;
use serde::Serialize;
use tracing::{debug, info, warn};

use lochist_diff::{diff_trees, TreeDiff};
use lochist_refs::{FileRefStore, RefStore, Tag};
use lochist_store::{
    Blob, CommitObject, DiskObjectStore, EntryMode, ObjectKind, ObjectStore, StoreError, Tree,
    TreeEntry,
};
use lochist_types::{ObjectId, Timestamp};

use crate::error::{HistoryError, HistoryResult};

/// Hidden directory holding a project's history.
pub const HISTORY_DIR_NAME: &str = ".history";

/// Tag marking the snapshot that matches the last explicit save.
pub const LAST_SAVE_TAG: &str = "project";

/// Per-directory ignore file honoured by full-project snapshots.
pub const IGNORE_FILE_NAME: &str = ".historyignore";

/// Summary of one commit, as shown in history lists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    #[serde(serialize_with = "hex_id")]
    pub id: ObjectId,
    pub summary: String,
    pub message: String,
    pub timestamp: Timestamp,
    pub file_count: usize,
    /// The parent was pruned by retention; this snapshot is displayed as a root.
    pub truncated: bool,
}

/// Result of an integrity check.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub commits_checked: usize,
    pub objects_checked: usize,
    pub missing: Vec<String>,
    pub corrupt: Vec<String>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty() && self.corrupt.is_empty()
    }
}

fn hex_id<S: serde::Serializer>(id: &ObjectId, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&id.to_hex())
}

/// Storage and commit operations for a single project.
pub struct ProjectRepository {
    root: PathBuf,
    objects: Box<dyn ObjectStore>,
    refs: Box<dyn RefStore>,
}

impl std::fmt::Debug for ProjectRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectRepository")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl ProjectRepository {
    /// Create the `.history/` layout if missing and open it.
    pub fn init(project: &Path) -> HistoryResult<Self> {
        let history = project.join(HISTORY_DIR_NAME);
        fs::create_dir_all(&history)?;
        let repo = Self::open_dir(project, &history)?;
        info!(project = %project.display(), "history initialized");
        Ok(repo)
    }

    /// Open an existing history. Fails with `NotInitialized` if none exists.
    pub fn open(project: &Path) -> HistoryResult<Self> {
        if !Self::exists(project) {
            return Err(HistoryError::NotInitialized(project.to_path_buf()));
        }
        Self::open_dir(project, &project.join(HISTORY_DIR_NAME))
    }

    fn open_dir(project: &Path, history: &Path) -> HistoryResult<Self> {
        let objects = DiskObjectStore::open(history)?;
        let refs = FileRefStore::open(history)?;
        Ok(Self::with_stores(project, Box::new(objects), Box::new(refs)))
    }

    /// Assemble a repository over arbitrary backends.
    pub fn with_stores(
        project: &Path,
        objects: Box<dyn ObjectStore>,
        refs: Box<dyn RefStore>,
    ) -> Self {
        Self {
            root: project.to_path_buf(),
            objects,
            refs,
        }
    }

    /// Whether `project` has a usable history directory.
    pub fn exists(project: &Path) -> bool {
        project.join(HISTORY_DIR_NAME).join("objects").is_dir()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn objects(&self) -> &dyn ObjectStore {
        self.objects.as_ref()
    }

    pub fn refs(&self) -> &dyn RefStore {
        self.refs.as_ref()
    }

    pub fn head(&self) -> HistoryResult<Option<ObjectId>> {
        Ok(self.refs.head()?)
    }

    // ---- Commits ----

    /// Snapshot the given project-relative files as one commit.
    ///
    /// Files that no longer exist are skipped with a warning. Fails with
    /// `NoFiles` when nothing remains to record.
    pub fn commit_paths(&self, label: &str, paths: &[String]) -> HistoryResult<ObjectId> {
        let mut entries = Vec::with_capacity(paths.len());
        for rel in paths {
            let path = self.root.join(rel);
            let data = match fs::read(&path) {
                Ok(data) => data,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(path = %path.display(), "skipping missing file");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let mode = fs::metadata(&path)
                .map(|m| EntryMode::from_metadata(&m))
                .unwrap_or(EntryMode::Regular);
            let size = data.len() as u64;
            let id = self.objects.write(&Blob::new(data).to_stored_object())?;
            entries.push(TreeEntry::new(mode, rel.as_str(), id, size));
        }
        if entries.is_empty() {
            return Err(HistoryError::NoFiles);
        }

        let tree = Tree::new(entries);
        let message = commit_message(label, &tree);
        let tree_id = self.objects.write(&tree.to_stored_object()?)?;
        self.commit_tree(tree_id, label, &message)
    }

    /// Snapshot every regular file under the project root.
    pub fn commit_full_snapshot(&self, label: &str) -> HistoryResult<ObjectId> {
        let files = project_files(&self.root)?;
        self.commit_paths(label, &files)
    }

    /// Record a commit for an already stored tree, parented on head.
    pub fn commit_tree(&self, tree: ObjectId, summary: &str, message: &str) -> HistoryResult<ObjectId> {
        let commit = CommitObject {
            tree,
            parent: self.refs.head()?,
            summary: summary.to_string(),
            message: message.to_string(),
            timestamp: Timestamp::now(),
        };
        let id = self.objects.write(&commit.to_stored_object()?)?;
        self.refs.append(id)?;
        info!(id = %id.short_hex(), summary, "snapshot committed");
        Ok(id)
    }

    // ---- Tags ----

    /// Move tag `name` to head.
    pub fn tag_head(&self, name: &str) -> HistoryResult<ObjectId> {
        let head = self.refs.head()?.ok_or(HistoryError::NoHead)?;
        if let Some(existing) = self.refs.read_tag(name)? {
            if existing.target == head {
                debug!(tag = name, "tag already at head");
                return Ok(head);
            }
        }
        self.refs.write_tag(&Tag::new(name, head))?;
        debug!(tag = name, target = %head.short_hex(), "tag moved");
        Ok(head)
    }

    /// `true` when head exists and the last-save tag is missing or elsewhere.
    pub fn head_newer_than_last_save(&self) -> HistoryResult<bool> {
        let Some(head) = self.refs.head()? else {
            return Ok(false);
        };
        Ok(match self.refs.read_tag(LAST_SAVE_TAG)? {
            Some(tag) => tag.target != head,
            None => true,
        })
    }

    pub fn tags(&self) -> HistoryResult<Vec<(String, ObjectId)>> {
        Ok(self
            .refs
            .list_tags()?
            .into_iter()
            .map(|t| (t.name, t.target))
            .collect())
    }

    // ---- Reading ----

    /// Resolve a tag name, full hash, or unique hash prefix to a commit id.
    pub fn resolve(&self, rev: &str) -> HistoryResult<ObjectId> {
        if let Some(tag) = self.refs.read_tag(rev)? {
            return Ok(tag.target);
        }
        if rev.len() == 64 {
            let id = ObjectId::from_hex(rev)?;
            return if self.objects.exists(&id)? {
                Ok(id)
            } else {
                Err(HistoryError::CommitNotFound(rev.to_string()))
            };
        }
        let log = self.refs.log()?;
        let matches: Vec<ObjectId> = log
            .entries()
            .iter()
            .filter(|id| id.matches_prefix(rev))
            .copied()
            .collect();
        match matches.as_slice() {
            [id] => Ok(*id),
            [] => Err(HistoryError::CommitNotFound(rev.to_string())),
            _ => Err(HistoryError::AmbiguousPrefix {
                prefix: rev.to_string(),
                matches: matches.len(),
            }),
        }
    }

    pub fn read_commit(&self, id: &ObjectId) -> HistoryResult<CommitObject> {
        let stored = self
            .objects
            .read(id)?
            .ok_or_else(|| HistoryError::CommitNotFound(id.to_hex()))?;
        Ok(CommitObject::from_stored_object(&stored)?)
    }

    pub fn read_tree(&self, id: &ObjectId) -> HistoryResult<Tree> {
        let stored = self.objects.read(id)?.ok_or(StoreError::NotFound(*id))?;
        Ok(Tree::from_stored_object(&stored)?)
    }

    pub fn read_blob(&self, id: &ObjectId) -> HistoryResult<Vec<u8>> {
        let stored = self.objects.read(id)?.ok_or(StoreError::NotFound(*id))?;
        Ok(Blob::from_stored_object(&stored)?.data)
    }

    /// Tree recorded by head, or an empty tree for a fresh history.
    pub fn head_tree(&self) -> HistoryResult<Tree> {
        match self.refs.head()? {
            Some(head) => {
                let commit = self.read_commit(&head)?;
                self.read_tree(&commit.tree)
            }
            None => Ok(Tree::empty()),
        }
    }

    /// Up to `limit` snapshots, newest first.
    pub fn history(&self, limit: usize) -> HistoryResult<Vec<Snapshot>> {
        let log = self.refs.log()?;
        let retained: HashSet<&ObjectId> = log.entries().iter().collect();
        let mut out = Vec::new();
        for id in log.newest_first().take(limit) {
            let commit = self.read_commit(id)?;
            let file_count = self.read_tree(&commit.tree).map(|t| t.len()).unwrap_or(0);
            out.push(Snapshot {
                id: *id,
                truncated: commit.parent.is_some_and(|p| !retained.contains(&p)),
                summary: commit.summary,
                message: commit.message,
                timestamp: commit.timestamp,
                file_count,
            });
        }
        Ok(out)
    }

    /// File-level changes between two commits.
    pub fn diff(&self, from: &ObjectId, to: &ObjectId) -> HistoryResult<TreeDiff> {
        let old = self.read_commit(from)?;
        let new = self.read_commit(to)?;
        Ok(diff_trees(self.objects.as_ref(), Some(&old.tree), &new.tree)?)
    }

    /// Re-read and re-hash every object reachable from the log and tags.
    pub fn verify(&self) -> HistoryResult<VerifyReport> {
        let mut report = VerifyReport::default();
        let mut roots: Vec<ObjectId> = self.refs.log()?.entries().to_vec();
        roots.extend(self.refs.tagged_ids()?);
        let mut seen = HashSet::new();

        for commit_id in roots {
            if !seen.insert(commit_id) {
                continue;
            }
            report.commits_checked += 1;
            let Some(commit) = self.check_object(&commit_id, ObjectKind::Commit, &mut report)
            else {
                continue;
            };
            let Ok(commit) = CommitObject::from_stored_object(&commit) else {
                report.corrupt.push(commit_id.to_hex());
                continue;
            };
            if !seen.insert(commit.tree) {
                continue;
            }
            let Some(tree) = self.check_object(&commit.tree, ObjectKind::Tree, &mut report) else {
                continue;
            };
            let Ok(tree) = Tree::from_stored_object(&tree) else {
                report.corrupt.push(commit.tree.to_hex());
                continue;
            };
            for entry in tree.entries {
                if seen.insert(entry.object_id) {
                    self.check_object(&entry.object_id, ObjectKind::Blob, &mut report);
                }
            }
        }
        if !report.is_ok() {
            warn!(
                missing = report.missing.len(),
                corrupt = report.corrupt.len(),
                "history verification failed"
            );
        }
        Ok(report)
    }

    fn check_object(
        &self,
        id: &ObjectId,
        kind: ObjectKind,
        report: &mut VerifyReport,
    ) -> Option<lochist_store::StoredObject> {
        report.objects_checked += 1;
        match self.objects.read(id) {
            Ok(Some(obj)) if obj.kind == kind => Some(obj),
            Ok(Some(_)) => {
                report.corrupt.push(id.to_hex());
                None
            }
            Ok(None) => {
                report.missing.push(id.to_hex());
                None
            }
            Err(e) => {
                debug!(id = %id.short_hex(), error = %e, "object failed verification");
                report.corrupt.push(id.to_hex());
                None
            }
        }
    }

    // ---- Materialising ----

    /// Write every file of `tree` into the project. Returns the file count.
    ///
    /// Nothing is written if any entry would land outside the project.
    pub fn checkout_tree(&self, tree: &Tree) -> HistoryResult<usize> {
        let targets = tree
            .entries
            .iter()
            .map(|entry| self.checkout_path(&entry.path))
            .collect::<HistoryResult<Vec<_>>>()?;
        for (entry, path) in tree.entries.iter().zip(targets) {
            let data = self.read_blob(&entry.object_id)?;
            let dir = path.parent().unwrap_or(&self.root);
            fs::create_dir_all(dir)?;
            let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
            tmp.write_all(&data)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| HistoryError::Io(e.error))?;
            apply_mode(&path, entry.mode)?;
        }
        Ok(tree.len())
    }

    fn checkout_path(&self, relative: &str) -> HistoryResult<PathBuf> {
        let path = Path::new(relative);
        let contained = path.components().next().is_some()
            && path
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained {
            return Err(HistoryError::OutsideProject(relative.to_string()));
        }
        Ok(self.root.join(path))
    }
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: EntryMode) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let bits = match mode {
        EntryMode::Regular => 0o644,
        EntryMode::Executable => 0o755,
    };
    fs::set_permissions(path, fs::Permissions::from_mode(bits))
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: EntryMode) -> io::Result<()> {
    Ok(())
}

fn commit_message(label: &str, tree: &Tree) -> String {
    let mut message = format!("{label}\n");
    for entry in &tree.entries {
        message.push('\n');
        message.push_str(&entry.path);
    }
    message
}

/// Every regular file under `root` as `/`-separated relative paths, sorted.
///
/// Honours `.gitignore` and `.historyignore` files and never descends into
/// the history directory or `.git`.
pub fn project_files(root: &Path) -> HistoryResult<Vec<String>> {
    let mut files = Vec::new();
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .require_git(false)
        .add_custom_ignore_filename(IGNORE_FILE_NAME)
        .filter_entry(|entry| {
            let name = entry.file_name();
            !(entry.depth() > 0 && (name == HISTORY_DIR_NAME || name == ".git"))
        })
        .build();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if let Some(rel) = crate::saver::relative_path(root, entry.path()) {
            files.push(rel);
        }
    }
    files.sort();
    Ok(files)
}
