//! Local history engine for lochist.
//!
//! Components report which files they care about through saver callbacks;
//! the engine reads those files, snapshots them into a content-addressed
//! store under `<project>/.history/`, and keeps named save points.
//!
//! # Key Types
//!
//! - [`LocalHistory`] -- commit coordinator; soft `bool`/`Option` API
//! - [`ProjectRepository`] -- one project's store with `HistoryResult` errors
//! - [`HistoryContext`] -- project lifecycle: load, autosave, close, restore
//! - [`StatusScanner`] -- background comparison of disk against head
//! - [`HistoryConfig`] -- backup, autosave, and status settings
//!
//! # Modules
//!
//! - [`saver`] -- saver registry
//! - [`repository`] -- commits, tags, history listing, verification
//! - [`retention`] -- size-limit enforcement
//! - [`restore`] -- two-phase restore
//! - [`autosave`] -- debounce timer
//! - [`status`] -- status scanner and its timers
//! - [`session`] -- the host-facing context

pub mod autosave;
pub mod config;
pub mod editor;
pub mod error;
pub mod history;
pub mod repository;
pub mod restore;
pub mod retention;
pub mod saver;
pub mod session;
pub mod status;

pub use autosave::AutosaveTimer;
pub use config::{BackupConfig, HistoryConfig, StatusConfig, SystemConfig};
pub use editor::{Capabilities, EditorHandle, EditorHost};
pub use error::{HistoryError, HistoryResult};
pub use history::LocalHistory;
pub use repository::{
    project_files, ProjectRepository, Snapshot, VerifyReport, HISTORY_DIR_NAME, LAST_SAVE_TAG,
};
pub use restore::{RestoreOutcome, RestoreTracker};
pub use retention::{enforce_size_limit, RetentionReport};
pub use saver::{SaverFn, SaverRegistry};
pub use session::{HistoryContext, LoadOutcome, Preloader, ProjectSession, TickReport};
pub use status::{FileStatus, PollOutcome, ScanResult, StatusMap, StatusScanner, StatusTimers};
