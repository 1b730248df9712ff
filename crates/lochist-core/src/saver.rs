//! Registry of saver callbacks.
//!
//! A saver reports which files a component wants captured in the next
//! snapshot. It does not write or read those files; the commit coordinator
//! reads the bytes itself.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use lochist_types::OwnerId;
use tracing::debug;

/// Callback producing the file set for a project.
pub type SaverFn = Box<dyn Fn(&Path) -> Vec<PathBuf> + Send>;

/// Owner-keyed saver callbacks, kept in registration order.
#[derive(Default)]
pub struct SaverRegistry {
    savers: Vec<(OwnerId, SaverFn)>,
}

impl SaverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `owner`, replacing any earlier registration
    /// in place.
    pub fn register(&mut self, owner: OwnerId, callback: SaverFn) {
        match self.savers.iter_mut().find(|(o, _)| *o == owner) {
            Some(slot) => {
                slot.1 = callback;
                debug!(%owner, "saver replaced");
            }
            None => {
                self.savers.push((owner, callback));
                debug!(%owner, "saver registered");
            }
        }
    }

    /// Remove the registration for `owner`. Returns whether one existed.
    pub fn unregister(&mut self, owner: &OwnerId) -> bool {
        let before = self.savers.len();
        self.savers.retain(|(o, _)| o != owner);
        before != self.savers.len()
    }

    pub fn is_registered(&self, owner: &OwnerId) -> bool {
        self.savers.iter().any(|(o, _)| o == owner)
    }

    pub fn len(&self) -> usize {
        self.savers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.savers.is_empty()
    }

    /// Run every saver and return the union of their files as
    /// `/`-separated paths relative to `project`, deduplicated, in the order
    /// first reported. Paths outside the project are dropped.
    pub(crate) fn collect(&self, project: &Path) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();
        for (owner, saver) in &self.savers {
            for path in saver(project) {
                match relative_path(project, &path) {
                    Some(rel) => {
                        if seen.insert(rel.clone()) {
                            files.push(rel);
                        }
                    }
                    None => debug!(%owner, path = %path.display(), "saver path outside project"),
                }
            }
        }
        files
    }
}

impl std::fmt::Debug for SaverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.savers.iter().map(|(o, _)| o)).finish()
    }
}

/// Express `path` relative to `project` with `/` separators.
///
/// Relative inputs are taken relative to the project. Returns `None` for
/// paths that escape the project or name the project root itself.
pub fn relative_path(project: &Path, path: &Path) -> Option<String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        project.join(path)
    };
    let stripped = absolute
        .strip_prefix(project)
        .map(Path::to_path_buf)
        .or_else(|_| {
            let canonical = fs::canonicalize(&absolute)?;
            let root = fs::canonicalize(project)?;
            canonical
                .strip_prefix(&root)
                .map(Path::to_path_buf)
                .map_err(|_| std::io::Error::from(std::io::ErrorKind::NotFound))
        })
        .ok()?;

    let mut parts: Vec<String> = Vec::new();
    for component in stripped.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(files: &'static [&'static str]) -> SaverFn {
        Box::new(move |root: &Path| files.iter().map(|f| root.join(f)).collect())
    }

    #[test]
    fn reregistration_replaces_callback() {
        let mut reg = SaverRegistry::new();
        let owner = OwnerId::new();
        reg.register(owner, fixed(&["a.kicad_sch"]));
        reg.register(owner, fixed(&["b.kicad_pcb"]));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.collect(Path::new("/proj")), vec!["b.kicad_pcb"]);
    }

    #[test]
    fn unregister_missing_owner_is_noop() {
        let mut reg = SaverRegistry::new();
        assert!(!reg.unregister(&OwnerId::new()));
        let owner = OwnerId::new();
        reg.register(owner, fixed(&["x"]));
        assert!(reg.unregister(&owner));
        assert!(reg.is_empty());
    }

    #[test]
    fn collect_dedups_across_savers_in_order() {
        let mut reg = SaverRegistry::new();
        reg.register(OwnerId::new(), fixed(&["b.kicad_pcb", "a.kicad_sch"]));
        reg.register(OwnerId::new(), fixed(&["a.kicad_sch", "sub/c.kicad_sch"]));
        assert_eq!(
            reg.collect(Path::new("/proj")),
            vec!["b.kicad_pcb", "a.kicad_sch", "sub/c.kicad_sch"]
        );
    }

    #[test]
    fn relative_path_normalisation() {
        let root = Path::new("/proj");
        assert_eq!(relative_path(root, Path::new("/proj/a/b.txt")).as_deref(), Some("a/b.txt"));
        assert_eq!(relative_path(root, Path::new("a/./c.txt")).as_deref(), Some("a/c.txt"));
        assert_eq!(relative_path(root, Path::new("a/../d.txt")).as_deref(), Some("d.txt"));
        assert_eq!(relative_path(root, Path::new("../escape.txt")), None);
        assert_eq!(relative_path(root, Path::new("/elsewhere/x.txt")), None);
        assert_eq!(relative_path(root, Path::new("/proj")), None);
    }
}
