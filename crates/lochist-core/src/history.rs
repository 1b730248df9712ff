//! The commit coordinator.
//!
//! [`LocalHistory`] owns the saver registry and one repository per project.
//! All operations are soft: failures are logged and reported as `false` or
//! `None`, never propagated to the caller.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use lochist_diff::TreeDiff;
use lochist_types::{ObjectId, OwnerId};

use crate::config::BackupConfig;
use crate::editor::EditorHost;
use crate::error::{HistoryError, HistoryResult};
use crate::repository::{ProjectRepository, Snapshot, VerifyReport, LAST_SAVE_TAG};
use crate::restore::{self, RestoreOutcome};
use crate::retention::{self, RetentionReport};
use crate::saver::{SaverFn, SaverRegistry};

pub const SAVE_LABEL: &str = "Save";

/// Coordinates savers, commits, tags, retention, and restore.
#[derive(Debug, Default)]
pub struct LocalHistory {
    savers: SaverRegistry,
    repos: HashMap<PathBuf, ProjectRepository>,
}

/// Key projects by canonical path so `a/../proj` and `proj` share a repo.
fn project_key(project: &Path) -> PathBuf {
    fs::canonicalize(project).unwrap_or_else(|_| project.to_path_buf())
}

fn soft<T>(op: &str, project: &Path, result: HistoryResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(op, project = %project.display(), error = %e, "local history operation failed");
            None
        }
    }
}

impl LocalHistory {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- Savers ----

    pub fn register_saver(&mut self, owner: OwnerId, saver: SaverFn) {
        self.savers.register(owner, saver);
    }

    pub fn unregister_saver(&mut self, owner: &OwnerId) -> bool {
        self.savers.unregister(owner)
    }

    pub fn savers(&self) -> &SaverRegistry {
        &self.savers
    }

    // ---- Repositories ----

    /// Open the project's repository, creating the layout when `create`.
    pub fn repository(&mut self, project: &Path, create: bool) -> HistoryResult<&ProjectRepository> {
        let key = project_key(project);
        if !self.repos.contains_key(&key) {
            let repo = if create {
                ProjectRepository::init(&key)?
            } else {
                ProjectRepository::open(&key)?
            };
            self.repos.insert(key.clone(), repo);
        } else if !ProjectRepository::exists(&key) {
            // Directory removed behind our back.
            self.repos.remove(&key);
            return if create {
                self.repository(project, true)
            } else {
                Err(HistoryError::NotInitialized(key))
            };
        }
        self.repos
            .get(&key)
            .ok_or_else(|| HistoryError::NotInitialized(key.clone()))
    }

    /// Forget a cached repository handle.
    pub fn close(&mut self, project: &Path) {
        self.repos.remove(&project_key(project));
    }

    fn with_repo<T>(
        &mut self,
        op: &str,
        project: &Path,
        f: impl FnOnce(&ProjectRepository) -> HistoryResult<T>,
    ) -> Option<T> {
        let result = self.repository(project, false).and_then(f);
        soft(op, project, result)
    }

    pub fn init(&mut self, project: &Path) -> bool {
        let result = self.repository(project, true).map(|_| ());
        soft("init", project, result).is_some()
    }

    pub fn history_exists(&self, project: &Path) -> bool {
        ProjectRepository::exists(&project_key(project))
    }

    // ---- Commits ----

    pub fn run_registered_savers_and_commit(&mut self, project: &Path, label: &str) -> bool {
        let key = project_key(project);
        let result = self.commit_from_savers(&key, label);
        soft("run_registered_savers_and_commit", project, result).is_some()
    }

    fn commit_from_savers(&mut self, project: &Path, label: &str) -> HistoryResult<ObjectId> {
        if self.savers.is_empty() {
            return Err(HistoryError::NoSavers);
        }
        // Open first: savers must not run for a project without history.
        self.repository(project, false)?;
        let files = self.savers.collect(project);
        debug!(files = files.len(), label, "savers collected");
        self.repository(project, false)?.commit_paths(label, &files)
    }

    pub fn commit_full_project_snapshot(&mut self, project: &Path, label: &str) -> bool {
        self.with_repo("commit_full_project_snapshot", project, |repo| {
            repo.commit_full_snapshot(label)
        })
        .is_some()
    }

    pub fn tag_save(&mut self, project: &Path, tag: &str) -> bool {
        self.with_repo("tag_save", project, |repo| repo.tag_head(tag))
            .is_some()
    }

    /// Full snapshot labelled "Save", followed by moving `tag` to it.
    pub fn save_point(&mut self, project: &Path, tag: &str) -> bool {
        self.commit_full_project_snapshot(project, SAVE_LABEL) && self.tag_save(project, tag)
    }

    // ---- Queries ----

    pub fn head_newer_than_last_save(&mut self, project: &Path) -> bool {
        if !self.history_exists(project) {
            return false;
        }
        self.with_repo("head_newer_than_last_save", project, |repo| {
            repo.head_newer_than_last_save()
        })
        .unwrap_or(false)
    }

    pub fn get_head_hash(&mut self, project: &Path) -> Option<ObjectId> {
        if !self.history_exists(project) {
            return None;
        }
        self.with_repo("get_head_hash", project, |repo| repo.head())
            .flatten()
    }

    /// Snapshots for a history list view, newest first.
    pub fn history(&mut self, project: &Path, limit: usize) -> Vec<Snapshot> {
        self.with_repo("history", project, |repo| repo.history(limit))
            .unwrap_or_default()
    }

    pub fn tags(&mut self, project: &Path) -> Vec<(String, ObjectId)> {
        self.with_repo("tags", project, |repo| repo.tags())
            .unwrap_or_default()
    }

    pub fn diff(&mut self, project: &Path, from: &ObjectId, to: &ObjectId) -> Option<TreeDiff> {
        self.with_repo("diff", project, |repo| repo.diff(from, to))
    }

    pub fn verify(&mut self, project: &Path) -> Option<VerifyReport> {
        self.with_repo("verify", project, |repo| repo.verify())
    }

    // ---- Retention ----

    pub fn enforce_size_limit(&mut self, project: &Path, max_bytes: i64) -> Option<RetentionReport> {
        self.with_repo("enforce_size_limit", project, |repo| {
            retention::enforce_size_limit(repo, max_bytes)
        })
    }

    /// Run retention if backups are enabled with a positive limit.
    pub fn apply_retention_policy(
        &mut self,
        project: &Path,
        backup: &BackupConfig,
    ) -> Option<RetentionReport> {
        if !backup.retention_active() {
            debug!(enabled = backup.enabled, limit = backup.limit_total_size, "retention skipped");
            return None;
        }
        self.enforce_size_limit(project, backup.limit_total_size)
    }

    // ---- Restore ----

    /// Restore a snapshot and return the details.
    pub fn restore(
        &mut self,
        project: &Path,
        hash: &ObjectId,
        host: &mut dyn EditorHost,
    ) -> Option<RestoreOutcome> {
        self.with_repo("restore_commit", project, |repo| {
            restore::restore_commit(repo, hash, host)
        })
    }

    pub fn restore_commit(
        &mut self,
        project: &Path,
        hash: &ObjectId,
        host: &mut dyn EditorHost,
    ) -> bool {
        self.restore(project, hash, host).is_some()
    }

    /// Record the current disk state as the last explicit save.
    pub fn mark_saved(&mut self, project: &Path) -> bool {
        self.save_point(project, LAST_SAVE_TAG)
    }
}
