//! Host-side editors as seen by the history engine.

use serde::{Deserialize, Serialize};

/// What an editor or panel supports, checked directly by the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capabilities {
    /// The editor can be closed on request.
    pub closable: bool,
    /// The editor shows files of the active project.
    pub project_tied: bool,
}

impl Capabilities {
    pub const PROJECT_EDITOR: Self = Self {
        closable: true,
        project_tied: true,
    };

    /// Closed when the project closes or a restore runs.
    pub fn closes_with_project(&self) -> bool {
        self.closable && self.project_tied
    }
}

/// An open editor window, identified by a host-chosen name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EditorHandle {
    pub name: String,
    pub capabilities: Capabilities,
}

impl EditorHandle {
    pub fn new(name: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            name: name.into(),
            capabilities,
        }
    }
}

/// The application hosting the editors.
pub trait EditorHost {
    /// Editors currently open.
    fn open_editors(&self) -> Vec<EditorHandle>;

    /// Ask one editor to close. With `force` the editor discards unsaved
    /// changes. Returns `false` if the editor refused.
    fn close_editor(&mut self, editor: &EditorHandle, force: bool) -> bool;

    /// Reopen a previously closed editor. Returns `false` if it failed.
    fn reopen_editor(&mut self, editor: &EditorHandle) -> bool;

    /// Mark an editor's document as modified.
    fn mark_modified(&mut self, editor: &EditorHandle);

    /// Called once files have been restored from history.
    fn restore_completed(&mut self) {}
}

/// Close every project-tied editor. Stops at the first refusal.
///
/// Returns the editors that were closed.
pub fn close_project_editors(
    host: &mut dyn EditorHost,
    force: bool,
) -> Result<Vec<EditorHandle>, EditorHandle> {
    let mut closed = Vec::new();
    for editor in host.open_editors() {
        if !editor.capabilities.closes_with_project() {
            continue;
        }
        if !host.close_editor(&editor, force) {
            return Err(editor);
        }
        closed.push(editor);
    }
    Ok(closed)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::BTreeMap;

    /// Records editor state the way a GUI host would.
    #[derive(Debug, Default)]
    pub struct MockHost {
        pub open: Vec<EditorHandle>,
        pub modified: BTreeMap<String, bool>,
        pub refuse_close: bool,
        pub restores: usize,
    }

    impl MockHost {
        pub fn with_editors(names: &[&str]) -> Self {
            Self {
                open: names
                    .iter()
                    .map(|n| EditorHandle::new(*n, Capabilities::PROJECT_EDITOR))
                    .collect(),
                ..Default::default()
            }
        }

        pub fn is_modified(&self, name: &str) -> bool {
            self.modified.get(name).copied().unwrap_or(false)
        }
    }

    impl EditorHost for MockHost {
        fn open_editors(&self) -> Vec<EditorHandle> {
            self.open.clone()
        }

        fn close_editor(&mut self, editor: &EditorHandle, _force: bool) -> bool {
            if self.refuse_close {
                return false;
            }
            self.open.retain(|e| e != editor);
            self.modified.remove(&editor.name);
            true
        }

        fn reopen_editor(&mut self, editor: &EditorHandle) -> bool {
            self.open.push(editor.clone());
            self.modified.insert(editor.name.clone(), false);
            true
        }

        fn mark_modified(&mut self, editor: &EditorHandle) {
            self.modified.insert(editor.name.clone(), true);
        }

        fn restore_completed(&mut self) {
            self.restores += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockHost;
    use super::*;

    #[test]
    fn only_project_tied_closable_editors_close() {
        let mut host = MockHost::with_editors(&["pcb"]);
        host.open.push(EditorHandle::new(
            "calculator",
            Capabilities {
                closable: true,
                project_tied: false,
            },
        ));
        host.open.push(EditorHandle::new(
            "pinned",
            Capabilities {
                closable: false,
                project_tied: true,
            },
        ));
        let closed = close_project_editors(&mut host, true).unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].name, "pcb");
        assert_eq!(host.open.len(), 2);
    }

    #[test]
    fn refusal_is_reported() {
        let mut host = MockHost::with_editors(&["sch"]);
        host.refuse_close = true;
        let refused = close_project_editors(&mut host, false).unwrap_err();
        assert_eq!(refused.name, "sch");
    }
}
