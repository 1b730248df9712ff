//! Project lifecycle around the history engine.
//!
//! [`HistoryContext`] is handed to the host explicitly. It owns the settings,
//! the [`LocalHistory`] coordinator, and the active project session with its
//! timers and status scanner.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use lochist_types::{ObjectId, OwnerId};

use crate::autosave::AutosaveTimer;
use crate::config::HistoryConfig;
use crate::editor::{close_project_editors, EditorHost};
use crate::error::HistoryResult;
use crate::history::LocalHistory;
use crate::repository::LAST_SAVE_TAG;
use crate::restore::RestoreTracker;
use crate::retention::RetentionReport;
use crate::saver::SaverFn;
use crate::status::{scan_project, PollOutcome, ScanResult, StatusMap, StatusScanner, StatusTimers};

pub const AUTOSAVE_LABEL: &str = "Autosave";
pub const DECLINED_RESTORE_LABEL: &str = "Declined restore";
pub const CLOSE_LABEL: &str = "Close project";

/// A subsystem with background loading to cancel before a project closes.
pub trait Preloader {
    fn cancel_preload(&mut self);
}

/// What the host should do after loading a project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadOutcome {
    /// History is available (false for read-only projects).
    pub history_available: bool,
    /// History holds snapshots newer than the last save; offer a restore.
    pub offer_restore: bool,
    pub head: Option<ObjectId>,
}

/// Per-project state held while a project is open.
#[derive(Debug)]
pub struct ProjectSession {
    project: PathBuf,
    owner: OwnerId,
    autosave: AutosaveTimer,
    timers: StatusTimers,
    scanner: Option<StatusScanner>,
    /// Statuses from the last externally reported disk scan.
    last_disk_state: Option<StatusMap>,
}

impl ProjectSession {
    pub fn project(&self) -> &Path {
        &self.project
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn autosave(&self) -> &AutosaveTimer {
        &self.autosave
    }

    pub fn timers(&self) -> &StatusTimers {
        &self.timers
    }

    pub fn scanner(&self) -> Option<&StatusScanner> {
        self.scanner.as_ref()
    }

    /// Stop autosave and both status timers, then release the scanner.
    fn shut_down(&mut self) -> Option<StatusScanner> {
        self.autosave.stop();
        self.timers.stop();
        self.scanner.take()
    }
}

/// Work performed by one [`HistoryContext::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub autosaved: bool,
    pub autosave_failed: bool,
    pub scan_requested: bool,
    pub status_updated: bool,
}

pub struct HistoryContext {
    config: HistoryConfig,
    history: LocalHistory,
    session: Option<ProjectSession>,
    tracker: RestoreTracker,
    preloaders: Vec<Box<dyn Preloader>>,
}

impl std::fmt::Debug for HistoryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryContext")
            .field("config", &self.config)
            .field("session", &self.session)
            .field("preloaders", &self.preloaders.len())
            .finish_non_exhaustive()
    }
}

impl HistoryContext {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            config,
            history: LocalHistory::new(),
            session: None,
            tracker: RestoreTracker::new(),
            preloaders: Vec::new(),
        }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn history(&mut self) -> &mut LocalHistory {
        &mut self.history
    }

    pub fn session(&self) -> Option<&ProjectSession> {
        self.session.as_ref()
    }

    pub fn add_preloader(&mut self, preloader: Box<dyn Preloader>) {
        self.preloaders.push(preloader);
    }

    // ---- Lifecycle ----

    /// Open `project`: initialise history, register the project's saver, and
    /// start the timers.
    pub fn load_project(
        &mut self,
        project: &Path,
        owner: OwnerId,
        saver: SaverFn,
        now: Instant,
    ) -> LoadOutcome {
        if let Some(previous) = self.session.take() {
            warn!(project = %previous.project.display(), "loading over an open project");
            self.history.unregister_saver(&previous.owner);
        }

        let history_available = self.history.init(project);
        self.history.register_saver(owner, saver);

        let mut timers = StatusTimers::new(
            self.config.status.sync_interval(),
            self.config.status.refresh_delay(),
        );
        let scanner = history_available.then(|| {
            timers.start(now);
            StatusScanner::new(project)
        });

        self.session = Some(ProjectSession {
            project: project.to_path_buf(),
            owner,
            autosave: AutosaveTimer::new(self.config.system.debounce()),
            timers,
            scanner,
            last_disk_state: None,
        });

        let outcome = LoadOutcome {
            history_available,
            offer_restore: self.history.head_newer_than_last_save(project),
            head: self.history.get_head_hash(project),
        };
        info!(project = %project.display(), offer_restore = outcome.offer_restore, "project loaded");
        outcome
    }

    /// The user chose to keep the files on disk over newer history.
    pub fn decline_restore(&mut self) -> bool {
        let Some(project) = self.active_project() else {
            return false;
        };
        self.history
            .commit_full_project_snapshot(&project, DECLINED_RESTORE_LABEL)
            && self.history.tag_save(&project, LAST_SAVE_TAG)
    }

    /// Explicit save: snapshot disk and move the save tag.
    pub fn project_saved(&mut self) -> bool {
        let Some(project) = self.active_project() else {
            return false;
        };
        if let Some(session) = self.session.as_mut() {
            session.autosave.stop();
        }
        self.history.save_point(&project, LAST_SAVE_TAG)
    }

    /// Close the active project.
    ///
    /// Returns `false` without changing anything when an editor refuses to
    /// close. Preloads are cancelled and timers stopped before the scanner
    /// is dropped.
    pub fn close_project(&mut self, host: &mut dyn EditorHost) -> bool {
        let Some(project) = self.active_project() else {
            return true;
        };
        if let Err(editor) = close_project_editors(host, false) {
            info!(editor = %editor.name, "project close cancelled by editor");
            return false;
        }

        for preloader in &mut self.preloaders {
            preloader.cancel_preload();
        }
        let Some(mut session) = self.session.take() else {
            return true;
        };
        drop(session.shut_down());

        if self.history.history_exists(&project)
            && self.history.commit_full_project_snapshot(&project, CLOSE_LABEL)
        {
            self.history.tag_save(&project, LAST_SAVE_TAG);
        }
        self.history.unregister_saver(&session.owner);
        self.history.apply_retention_policy(&project, &self.config.backup);
        self.history.close(&project);
        info!(project = %project.display(), "project closed");
        true
    }

    /// New settings: re-initialise history and re-apply retention.
    pub fn settings_changed(&mut self, config: HistoryConfig, now: Instant) -> Option<RetentionReport> {
        self.config = config;
        let project = self.active_project()?;
        self.history.init(&project);
        if let Some(session) = self.session.as_mut() {
            session.autosave.set_debounce(self.config.system.debounce());
            session.timers.reconfigure(
                self.config.status.sync_interval(),
                self.config.status.refresh_delay(),
                now,
            );
        }
        self.history.apply_retention_policy(&project, &self.config.backup)
    }

    fn active_project(&self) -> Option<PathBuf> {
        self.session.as_ref().map(|s| s.project.clone())
    }

    // ---- Events ----

    /// A document was edited.
    pub fn notify_change(&mut self, now: Instant) {
        if let Some(session) = self.session.as_mut() {
            session.autosave.notify_change(now);
        }
    }

    /// Report a scan of the project directory made by an external watcher.
    ///
    /// Autosave is armed only when the statuses differ from the previous
    /// report and the project is dirty, so a project that stays dirty still
    /// reaches its deadline. Returns whether autosave was armed.
    pub fn disk_scanned(&mut self, result: &ScanResult, now: Instant) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if session.last_disk_state.as_ref() == Some(&result.statuses) {
            return false;
        }
        session.last_disk_state = Some(result.statuses.clone());
        if result.is_clean() {
            return false;
        }
        session.autosave.notify_change(now);
        session.timers.on_fs_event(now);
        true
    }

    /// Scan the active project against head and report it through
    /// [`disk_scanned`](Self::disk_scanned). Errors leave the session as is.
    pub fn scan_disk(&mut self, now: Instant) -> HistoryResult<bool> {
        let Some(project) = self.active_project() else {
            return Ok(false);
        };
        let base = self.history.repository(&project, false)?.head_tree()?;
        let scan = scan_project(&project, &base)?;
        Ok(self.disk_scanned(&scan, now))
    }

    /// A file changed on disk.
    pub fn on_fs_event(&mut self, now: Instant) {
        if let Some(session) = self.session.as_mut() {
            session.timers.on_fs_event(now);
        }
    }

    /// Drive the autosave and status timers.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();
        let Some(project) = self.active_project() else {
            return report;
        };

        let autosave_due = self
            .session
            .as_mut()
            .is_some_and(|s| s.autosave.poll(now));
        if autosave_due {
            if self.history.run_registered_savers_and_commit(&project, AUTOSAVE_LABEL) {
                report.autosaved = true;
            } else {
                report.autosave_failed = true;
                if let Some(session) = self.session.as_mut() {
                    session.autosave.notify_change(now);
                }
            }
        }

        let Some(session) = self.session.as_mut() else {
            return report;
        };
        let events = session.timers.poll(now);
        let Some(scanner) = session.scanner.as_mut() else {
            return report;
        };
        if events.any() {
            let base = self
                .history
                .repository(&project, false)
                .and_then(|repo| repo.head_tree());
            match base {
                Ok(base) => {
                    scanner.request_scan(base);
                    report.scan_requested = true;
                }
                Err(e) => debug!(error = %e, "status scan skipped"),
            }
        }
        match scanner.poll() {
            PollOutcome::Updated => report.status_updated = true,
            PollOutcome::Retry => session.timers.arm_refresh(now),
            PollOutcome::Idle => {}
        }
        report
    }

    /// Restore a snapshot of the active project. Editors reopen on the next
    /// [`idle`](Self::idle).
    pub fn restore_commit(&mut self, hash: &ObjectId, host: &mut dyn EditorHost) -> bool {
        let Some(project) = self.active_project() else {
            return false;
        };
        match self.history.restore(&project, hash, host) {
            Some(outcome) => {
                self.tracker.arm(outcome.reopen);
                true
            }
            None => false,
        }
    }

    pub fn restore_pending(&self) -> bool {
        self.tracker.is_pending()
    }

    /// Idle-time work: second phase of a restore.
    pub fn idle(&mut self, host: &mut dyn EditorHost) -> usize {
        self.tracker.on_idle(host)
    }
}
