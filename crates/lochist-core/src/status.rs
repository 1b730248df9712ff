//! Background status scanning.
//!
//! A scan hashes the project's files on the rayon pool and compares them with
//! the head snapshot. Results come back over a channel. The owner drains the
//! channel with [`StatusScanner::poll`], which only ever `try_lock`s the
//! shared caches: on contention the result is held and the caller re-arms
//! its refresh timer instead of waiting.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use lochist_crypto::ContentHasher;
use lochist_store::Tree;

use crate::error::HistoryResult;
use crate::repository::project_files;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Unchanged,
    Modified,
    /// On disk but not in the head snapshot.
    Added,
    /// In the head snapshot but gone from disk.
    Deleted,
}

/// Relative path to status.
pub type StatusMap = BTreeMap<String, FileStatus>;

/// Relative path to absolute path, for every file currently on disk.
pub type TreeItems = BTreeMap<String, PathBuf>;

/// Output of one scan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub generation: u64,
    pub statuses: StatusMap,
    pub tree_items: TreeItems,
}

impl ScanResult {
    /// Paths whose status is anything but `Unchanged`.
    pub fn changes(&self) -> impl Iterator<Item = (&str, FileStatus)> {
        self.statuses
            .iter()
            .filter(|(_, s)| **s != FileStatus::Unchanged)
            .map(|(p, s)| (p.as_str(), *s))
    }

    pub fn is_clean(&self) -> bool {
        self.changes().next().is_none()
    }
}

/// Compare the files under `project` with `base` synchronously.
pub fn scan_project(project: &Path, base: &Tree) -> HistoryResult<ScanResult> {
    let files = project_files(project)?;
    let hashed: Vec<(String, Option<lochist_types::ObjectId>)> = files
        .into_par_iter()
        .map(|rel| {
            let id = match fs::read(project.join(&rel)) {
                Ok(data) => Some(ContentHasher::BLOB.hash(&data)),
                Err(e) => {
                    debug!(path = %rel, error = %e, "unreadable during scan");
                    None
                }
            };
            (rel, id)
        })
        .collect();

    let mut result = ScanResult::default();
    for (rel, id) in hashed {
        let Some(id) = id else { continue };
        let status = match base.get(&rel) {
            Some(entry) if entry.object_id == id => FileStatus::Unchanged,
            Some(_) => FileStatus::Modified,
            None => FileStatus::Added,
        };
        result.tree_items.insert(rel.clone(), project.join(&rel));
        result.statuses.insert(rel, status);
    }
    for entry in &base.entries {
        if !result.statuses.contains_key(&entry.path) {
            result.statuses.insert(entry.path.clone(), FileStatus::Deleted);
        }
    }
    Ok(result)
}

/// What [`StatusScanner::poll`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing new.
    Idle,
    /// Caches now hold the latest result.
    Updated,
    /// A cache was busy; poll again after re-arming the refresh timer.
    Retry,
}

/// Owns the status caches and the channel from scan tasks.
#[derive(Debug)]
pub struct StatusScanner {
    project: PathBuf,
    status: Arc<Mutex<StatusMap>>,
    tree_items: Arc<Mutex<TreeItems>>,
    tx: Sender<ScanResult>,
    rx: Receiver<ScanResult>,
    held: Option<ScanResult>,
    generation: u64,
    in_flight: usize,
}

fn try_guard<T>(mutex: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    match mutex.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

impl StatusScanner {
    pub fn new(project: &Path) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            project: project.to_path_buf(),
            status: Arc::default(),
            tree_items: Arc::default(),
            tx,
            rx,
            held: None,
            generation: 0,
            in_flight: 0,
        }
    }

    /// Start a scan against `base` on the rayon pool.
    pub fn request_scan(&mut self, base: Tree) {
        self.generation += 1;
        self.in_flight += 1;
        let generation = self.generation;
        let project = self.project.clone();
        let tx = self.tx.clone();
        rayon::spawn(move || match scan_project(&project, &base) {
            Ok(mut result) => {
                result.generation = generation;
                // The scanner may already be gone.
                let _ = tx.send(result);
            }
            Err(e) => {
                warn!(project = %project.display(), error = %e, "status scan failed");
                let _ = tx.send(ScanResult {
                    generation,
                    ..Default::default()
                });
            }
        });
        debug!(generation, "status scan requested");
    }

    pub fn scans_in_flight(&self) -> usize {
        self.in_flight
    }

    fn drain(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(result) => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    let newer = self
                        .held
                        .as_ref()
                        .map_or(true, |held| result.generation >= held.generation);
                    if newer {
                        self.held = Some(result);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    /// Move the newest finished scan into the caches without blocking.
    pub fn poll(&mut self) -> PollOutcome {
        self.drain();
        let Some(result) = self.held.take() else {
            return PollOutcome::Idle;
        };
        let (Some(mut status), Some(mut items)) =
            (try_guard(&self.status), try_guard(&self.tree_items))
        else {
            debug!(generation = result.generation, "status cache busy, retrying");
            self.held = Some(result);
            return PollOutcome::Retry;
        };
        *status = result.statuses;
        *items = result.tree_items;
        PollOutcome::Updated
    }

    /// Block until a scan arrives or `timeout` passes, then poll.
    ///
    /// For callers without an event loop; interactive hosts use `poll`.
    pub fn wait(&mut self, timeout: Duration) -> PollOutcome {
        if self.held.is_none() {
            if let Ok(result) = self.rx.recv_timeout(timeout) {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.held = Some(result);
            }
        }
        self.poll()
    }

    /// Cached status of one file, if the cache is free.
    pub fn status_of(&self, path: &str) -> Option<FileStatus> {
        try_guard(&self.status).and_then(|s| s.get(path).copied())
    }

    /// Copy of the status cache, if it is free.
    pub fn try_statuses(&self) -> Option<StatusMap> {
        try_guard(&self.status).map(|s| s.clone())
    }

    /// Copy of the tree-item cache, if it is free.
    pub fn try_tree_items(&self) -> Option<TreeItems> {
        try_guard(&self.tree_items).map(|s| s.clone())
    }

    /// Shared handle to the status cache, for readers on other threads.
    pub fn status_cache(&self) -> Arc<Mutex<StatusMap>> {
        Arc::clone(&self.status)
    }
}

/// Which status timers fired.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimerEvents {
    pub sync: bool,
    pub refresh: bool,
}

impl TimerEvents {
    pub fn any(&self) -> bool {
        self.sync || self.refresh
    }
}

/// Periodic sync timer plus a one-shot refresh timer.
#[derive(Debug, Clone)]
pub struct StatusTimers {
    sync_interval: Duration,
    refresh_delay: Duration,
    next_sync: Option<Instant>,
    refresh_at: Option<Instant>,
}

impl StatusTimers {
    pub fn new(sync_interval: Duration, refresh_delay: Duration) -> Self {
        Self {
            sync_interval,
            refresh_delay,
            next_sync: None,
            refresh_at: None,
        }
    }

    /// Start the sync timer and schedule an initial refresh.
    pub fn start(&mut self, now: Instant) {
        if !self.sync_interval.is_zero() {
            self.next_sync = Some(now + self.sync_interval);
        }
        self.arm_refresh(now);
    }

    pub fn is_running(&self) -> bool {
        self.next_sync.is_some() || self.refresh_at.is_some()
    }

    /// A file changed on disk: push the refresh out.
    pub fn on_fs_event(&mut self, now: Instant) {
        self.arm_refresh(now);
    }

    pub fn arm_refresh(&mut self, now: Instant) {
        self.refresh_at = Some(now + self.refresh_delay);
    }

    pub fn poll(&mut self, now: Instant) -> TimerEvents {
        let mut events = TimerEvents::default();
        if let Some(at) = self.next_sync {
            if now >= at {
                events.sync = true;
                self.next_sync = Some(now + self.sync_interval);
            }
        }
        if let Some(at) = self.refresh_at {
            if now >= at {
                events.refresh = true;
                self.refresh_at = None;
            }
        }
        events
    }

    pub fn stop(&mut self) {
        self.next_sync = None;
        self.refresh_at = None;
    }

    pub fn reconfigure(&mut self, sync_interval: Duration, refresh_delay: Duration, now: Instant) {
        let running = self.is_running();
        self.sync_interval = sync_interval;
        self.refresh_delay = refresh_delay;
        if running {
            self.stop();
            self.start(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::ProjectRepository;
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(10);

    fn project() -> (TempDir, Tree) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("board.kicad_pcb"), b"v1").unwrap();
        fs::write(dir.path().join("top.kicad_sch"), b"s1").unwrap();
        let repo = ProjectRepository::init(dir.path()).unwrap();
        repo.commit_full_snapshot("Save").unwrap();
        let tree = repo.head_tree().unwrap();
        (dir, tree)
    }

    #[test]
    fn scan_classifies_files() {
        let (dir, base) = project();
        fs::write(dir.path().join("board.kicad_pcb"), b"v2").unwrap();
        fs::remove_file(dir.path().join("top.kicad_sch")).unwrap();
        fs::write(dir.path().join("new.kicad_sym"), b"n").unwrap();

        let result = scan_project(dir.path(), &base).unwrap();
        assert_eq!(result.statuses["board.kicad_pcb"], FileStatus::Modified);
        assert_eq!(result.statuses["top.kicad_sch"], FileStatus::Deleted);
        assert_eq!(result.statuses["new.kicad_sym"], FileStatus::Added);
        assert!(!result.tree_items.contains_key("top.kicad_sch"));
        assert_eq!(result.changes().count(), 3);
    }

    #[test]
    fn clean_project_after_snapshot() {
        let (dir, base) = project();
        assert!(scan_project(dir.path(), &base).unwrap().is_clean());
    }

    #[test]
    fn background_scan_updates_caches() {
        let (dir, base) = project();
        fs::write(dir.path().join("board.kicad_pcb"), b"v2").unwrap();
        let mut scanner = StatusScanner::new(dir.path());
        assert_eq!(scanner.poll(), PollOutcome::Idle);
        scanner.request_scan(base);
        assert_eq!(scanner.wait(WAIT), PollOutcome::Updated);
        assert_eq!(scanner.status_of("board.kicad_pcb"), Some(FileStatus::Modified));
        assert_eq!(scanner.try_tree_items().unwrap().len(), 2);
        assert_eq!(scanner.scans_in_flight(), 0);
    }

    #[test]
    fn contended_cache_asks_for_retry() {
        let (dir, base) = project();
        let mut scanner = StatusScanner::new(dir.path());
        let cache = scanner.status_cache();
        let guard = cache.lock().unwrap();

        scanner.request_scan(base);
        assert_eq!(scanner.wait(WAIT), PollOutcome::Retry);
        assert!(scanner.status_of("board.kicad_pcb").is_none());
        drop(guard);

        assert_eq!(scanner.poll(), PollOutcome::Updated);
        assert_eq!(scanner.status_of("board.kicad_pcb"), Some(FileStatus::Unchanged));
    }

    #[test]
    fn refresh_timer_is_one_shot_and_rearmed_by_events() {
        let t0 = Instant::now();
        let ms = Duration::from_millis;
        let mut timers = StatusTimers::new(Duration::from_secs(60), ms(500));
        timers.start(t0);
        assert!(!timers.poll(t0 + ms(400)).any());
        timers.on_fs_event(t0 + ms(400));
        assert!(!timers.poll(t0 + ms(800)).refresh);
        assert!(timers.poll(t0 + ms(900)).refresh);
        assert!(!timers.poll(t0 + ms(1000)).refresh);

        let events = timers.poll(t0 + Duration::from_secs(60));
        assert!(events.sync);
        timers.stop();
        assert!(!timers.is_running());
        assert!(!timers.poll(t0 + Duration::from_secs(600)).any());
    }
}
