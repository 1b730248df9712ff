//! Restoring a snapshot onto disk.
//!
//! Restore runs in two phases. The first phase closes editors, writes files,
//! and records what was open. The second runs on the host's next idle cycle:
//! editors are reopened and marked modified, since restored content is never
//! the saved content.

use tracing::{info, warn};

use lochist_types::ObjectId;

use crate::editor::{close_project_editors, EditorHandle, EditorHost};
use crate::error::{HistoryError, HistoryResult};
use crate::repository::ProjectRepository;

pub const BACKUP_LABEL: &str = "Backup before restore";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestoreOutcome {
    /// Snapshot of the pre-restore disk state, if there was anything to save.
    pub backup: Option<ObjectId>,
    /// Commit recording the restored state.
    pub restored: ObjectId,
    pub files_written: usize,
    /// Editors closed for the restore, to reopen on idle.
    pub reopen: Vec<EditorHandle>,
}

/// Materialise `target` onto the project directory.
///
/// Files not present in the snapshot are left alone.
pub fn restore_commit(
    repo: &ProjectRepository,
    target: &ObjectId,
    host: &mut dyn EditorHost,
) -> HistoryResult<RestoreOutcome> {
    let commit = repo.read_commit(target)?;
    let tree = repo.read_tree(&commit.tree)?;

    let reopen = close_project_editors(host, true).map_err(|editor| {
        warn!(editor = %editor.name, "editor refused to close for restore");
        HistoryError::EditorsBusy
    })?;

    let backup = match repo.commit_full_snapshot(BACKUP_LABEL) {
        Ok(id) => Some(id),
        Err(HistoryError::NoFiles) => None,
        Err(e) => return Err(e),
    };

    let files_written = repo.checkout_tree(&tree)?;
    let summary = format!("Restored {}", target.short_hex());
    let message = format!("{summary}\n\nfrom: {}\n{}", target.to_hex(), commit.summary);
    let restored = repo.commit_tree(commit.tree, &summary, &message)?;
    host.restore_completed();
    info!(target = %target.short_hex(), files = files_written, "snapshot restored");

    Ok(RestoreOutcome {
        backup,
        restored,
        files_written,
        reopen,
    })
}

/// Pending-dirty state carried between the two restore phases.
#[derive(Debug, Default)]
pub struct RestoreTracker {
    pending: Option<Vec<EditorHandle>>,
}

impl RestoreTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase one finished: remember which editors to reopen.
    pub fn arm(&mut self, editors: Vec<EditorHandle>) {
        self.pending = Some(editors);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Phase two: reopen each editor and mark it modified. Returns how many
    /// were reopened.
    pub fn on_idle(&mut self, host: &mut dyn EditorHost) -> usize {
        let Some(editors) = self.pending.take() else {
            return 0;
        };
        let mut reopened = 0;
        for editor in &editors {
            if host.reopen_editor(editor) {
                host.mark_modified(editor);
                reopened += 1;
            } else {
                warn!(editor = %editor.name, "could not reopen editor after restore");
            }
        }
        reopened
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::testing::MockHost;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ProjectRepository, ObjectId) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("board.kicad_pcb"), b"v1").unwrap();
        let repo = ProjectRepository::init(dir.path()).unwrap();
        let v1 = repo.commit_full_snapshot("Save").unwrap();
        fs::write(dir.path().join("board.kicad_pcb"), b"v2").unwrap();
        fs::write(dir.path().join("notes.txt"), b"new").unwrap();
        (dir, repo, v1)
    }

    #[test]
    fn restore_writes_files_and_backs_up() {
        let (dir, repo, v1) = setup();
        let mut host = MockHost::with_editors(&["pcb"]);
        let outcome = restore_commit(&repo, &v1, &mut host).unwrap();

        assert_eq!(fs::read(dir.path().join("board.kicad_pcb")).unwrap(), b"v1");
        assert_eq!(fs::read(dir.path().join("notes.txt")).unwrap(), b"new");
        assert_eq!(outcome.files_written, 1);
        assert_eq!(host.restores, 1);
        assert!(host.open.is_empty());

        let backup = outcome.backup.unwrap();
        let backup_tree = repo.read_tree(&repo.read_commit(&backup).unwrap().tree).unwrap();
        let v2 = backup_tree.get("board.kicad_pcb").unwrap();
        assert_eq!(repo.read_blob(&v2.object_id).unwrap(), b"v2");

        let restored = repo.read_commit(&outcome.restored).unwrap();
        assert_eq!(restored.parent, Some(backup));
        assert_eq!(restored.tree, repo.read_commit(&v1).unwrap().tree);
        assert_eq!(repo.head().unwrap(), Some(outcome.restored));
    }

    #[test]
    fn refusing_editor_aborts_before_touching_disk() {
        let (dir, repo, v1) = setup();
        let mut host = MockHost::with_editors(&["sch"]);
        host.refuse_close = true;
        let head_before = repo.head().unwrap();
        assert!(matches!(
            restore_commit(&repo, &v1, &mut host),
            Err(HistoryError::EditorsBusy)
        ));
        assert_eq!(fs::read(dir.path().join("board.kicad_pcb")).unwrap(), b"v2");
        assert_eq!(repo.head().unwrap(), head_before);
    }

    #[test]
    fn reopened_editor_is_dirty() {
        let (_dir, repo, v1) = setup();
        let mut host = MockHost::with_editors(&["pcb", "sch"]);
        let outcome = restore_commit(&repo, &v1, &mut host).unwrap();

        let mut tracker = RestoreTracker::new();
        tracker.arm(outcome.reopen);
        assert!(tracker.is_pending());
        assert_eq!(tracker.on_idle(&mut host), 2);
        assert!(host.is_modified("pcb"));
        assert!(host.is_modified("sch"));
        assert!(!tracker.is_pending());
        assert_eq!(tracker.on_idle(&mut host), 0);
    }

    #[test]
    fn unknown_commit_fails() {
        let (_dir, repo, _) = setup();
        let mut host = MockHost::default();
        let bogus = ObjectId::from_bytes(b"nope");
        assert!(restore_commit(&repo, &bogus, &mut host).is_err());
    }
}
