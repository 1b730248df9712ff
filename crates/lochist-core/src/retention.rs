//! Size-bounded pruning of a project's history.
//!
//! Oldest commits go first. Head and every tagged commit are never removed,
//! and neither is anything they reference. Victims are chosen against an
//! in-memory reference count of every retained object, then the log is
//! rewritten and the store swept once.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use lochist_store::{CommitObject, ObjectStore, Tree};
use lochist_types::ObjectId;

use crate::error::HistoryResult;
use crate::repository::ProjectRepository;

/// Outcome of a retention pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RetentionReport {
    pub commits_pruned: usize,
    pub objects_removed: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
    /// Total size ended at or below the limit. `false` when head and tags
    /// alone exceed it.
    pub within_budget: bool,
}

/// Drop the oldest eligible commits until stored size is at most `max_bytes`.
///
/// `max_bytes <= 0` disables the limit and leaves the store untouched.
pub fn enforce_size_limit(repo: &ProjectRepository, max_bytes: i64) -> HistoryResult<RetentionReport> {
    let objects = repo.objects();
    let bytes_before = objects.total_bytes()?;
    let mut report = RetentionReport {
        bytes_before,
        bytes_after: bytes_before,
        within_budget: true,
        ..Default::default()
    };
    if max_bytes <= 0 || bytes_before <= max_bytes as u64 {
        return Ok(report);
    }
    let limit = max_bytes as u64;

    let refs = repo.refs();
    let protected: HashSet<ObjectId> = refs.tagged_ids()?.into_iter().collect();
    let mut log = refs.log()?;

    let mut sizes = HashMap::new();
    for id in objects.list_ids()? {
        sizes.insert(id, objects.stored_size(&id)?.unwrap_or(0));
    }

    let roots: HashSet<ObjectId> = log.entries().iter().chain(&protected).copied().collect();
    let mut footprints = HashMap::new();
    let mut refcounts: HashMap<ObjectId, usize> = HashMap::new();
    for root in roots {
        let reached = footprint(objects, &root)?;
        for id in &reached {
            *refcounts.entry(*id).or_default() += 1;
        }
        footprints.insert(root, reached);
    }
    let mut projected: u64 = refcounts.keys().filter_map(|id| sizes.get(id)).sum();

    let head = log.head();
    let candidates: Vec<ObjectId> = log
        .entries()
        .iter()
        .filter(|id| Some(**id) != head && !protected.contains(id))
        .copied()
        .collect();
    for victim in candidates {
        if projected <= limit {
            break;
        }
        for id in footprints.get(&victim).into_iter().flatten() {
            if let Some(count) = refcounts.get_mut(id) {
                *count -= 1;
                if *count == 0 {
                    projected = projected.saturating_sub(sizes.get(id).copied().unwrap_or(0));
                }
            }
        }
        log.remove(&victim);
        report.commits_pruned += 1;
        debug!(commit = %victim.short_hex(), "pruned from log");
    }
    if report.commits_pruned > 0 {
        refs.replace_log(&log)?;
    }

    for id in sizes.keys() {
        let live = refcounts.get(id).is_some_and(|count| *count > 0);
        if !live && objects.delete(id)? {
            report.objects_removed += 1;
        }
    }

    let total = objects.total_bytes()?;
    report.bytes_after = total;
    report.within_budget = total <= limit;
    if report.within_budget {
        info!(
            pruned = report.commits_pruned,
            removed = report.objects_removed,
            bytes = total,
            "retention complete"
        );
    } else {
        warn!(bytes = total, limit, "history exceeds size limit; only protected snapshots remain");
    }
    Ok(report)
}

/// A commit, its tree, and that tree's blobs. Parents are not followed: the
/// log is the retention set.
fn footprint(objects: &dyn ObjectStore, commit_id: &ObjectId) -> HistoryResult<HashSet<ObjectId>> {
    let mut reached = HashSet::from([*commit_id]);
    let Some(stored) = objects.read(commit_id)? else {
        warn!(commit = %commit_id.short_hex(), "retained commit missing from store");
        return Ok(reached);
    };
    let commit = CommitObject::from_stored_object(&stored)?;
    reached.insert(commit.tree);
    if let Some(stored) = objects.read(&commit.tree)? {
        let tree = Tree::from_stored_object(&stored)?;
        reached.extend(tree.entries.iter().map(|e| e.object_id));
    }
    Ok(reached)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::LAST_SAVE_TAG;
    use lochist_refs::InMemoryRefStore;
    use lochist_store::{InMemoryObjectStore, StoreResult, StoredObject};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Counts full-store listings.
    struct ListingCounter {
        inner: InMemoryObjectStore,
        listings: Arc<AtomicUsize>,
    }

    impl ObjectStore for ListingCounter {
        fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
            self.inner.read(id)
        }
        fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
            self.inner.write(object)
        }
        fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
            self.inner.exists(id)
        }
        fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
            self.inner.delete(id)
        }
        fn stored_size(&self, id: &ObjectId) -> StoreResult<Option<u64>> {
            self.inner.stored_size(id)
        }
        fn list_ids(&self) -> StoreResult<Vec<ObjectId>> {
            self.listings.fetch_add(1, Ordering::SeqCst);
            self.inner.list_ids()
        }
    }

    /// Deterministic incompressible bytes (xorshift64).
    fn noise(seed: u64, len: usize) -> Vec<u8> {
        let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                state as u8
            })
            .collect()
    }

    fn autosave(dir: &TempDir, repo: &ProjectRepository, seed: u64, len: usize) -> ObjectId {
        fs::write(dir.path().join("board.kicad_pcb"), noise(seed, len)).unwrap();
        repo.commit_paths("Autosave", &["board.kicad_pcb".into()]).unwrap()
    }

    #[test]
    fn non_positive_limit_is_noop() {
        let dir = TempDir::new().unwrap();
        let repo = ProjectRepository::init(dir.path()).unwrap();
        for seed in 0..3 {
            autosave(&dir, &repo, seed, 1024);
        }
        for limit in [0, -1] {
            let report = enforce_size_limit(&repo, limit).unwrap();
            assert_eq!(report.commits_pruned, 0);
            assert_eq!(report.bytes_before, report.bytes_after);
        }
        assert_eq!(repo.refs().log().unwrap().len(), 3);
    }

    #[test]
    fn fifty_autosaves_fit_one_megabyte() {
        let dir = TempDir::new().unwrap();
        let repo = ProjectRepository::init(dir.path()).unwrap();
        let mut last = None;
        for seed in 0..50 {
            last = Some(autosave(&dir, &repo, seed, 100 * 1024));
        }
        let head = last.unwrap();
        assert!(repo.objects().total_bytes().unwrap() > 1024 * 1024);

        let report = enforce_size_limit(&repo, 1024 * 1024).unwrap();
        assert!(report.within_budget);
        assert!(report.commits_pruned > 0);
        assert!(repo.objects().total_bytes().unwrap() <= 1024 * 1024);
        assert_eq!(repo.head().unwrap(), Some(head));
        let commit = repo.read_commit(&head).unwrap();
        let tree = repo.read_tree(&commit.tree).unwrap();
        assert_eq!(repo.read_blob(&tree.entries[0].object_id).unwrap(), noise(49, 100 * 1024));
    }

    #[test]
    fn tagged_and_head_commits_survive() {
        let dir = TempDir::new().unwrap();
        let repo = ProjectRepository::init(dir.path()).unwrap();
        let tagged = autosave(&dir, &repo, 1, 64 * 1024);
        repo.tag_head(LAST_SAVE_TAG).unwrap();
        for seed in 2..10 {
            autosave(&dir, &repo, seed, 64 * 1024);
        }
        let head = repo.head().unwrap().unwrap();

        let report = enforce_size_limit(&repo, 1).unwrap();
        assert!(!report.within_budget);
        let log = repo.refs().log().unwrap();
        assert_eq!(log.entries(), &[tagged, head]);
        assert!(repo.verify().unwrap().is_ok());
        assert!(repo.history(10).unwrap().iter().any(|s| s.truncated));
    }

    #[test]
    fn shared_blobs_are_kept() {
        let dir = TempDir::new().unwrap();
        let repo = ProjectRepository::init(dir.path()).unwrap();
        fs::write(dir.path().join("lib.kicad_sym"), noise(7, 32 * 1024)).unwrap();
        for seed in 0..5 {
            fs::write(dir.path().join("board.kicad_pcb"), noise(seed + 100, 32 * 1024)).unwrap();
            repo.commit_full_snapshot("Autosave").unwrap();
        }
        enforce_size_limit(&repo, 80 * 1024).unwrap();
        assert!(repo.verify().unwrap().is_ok());
        assert_eq!(
            fs::read(dir.path().join("lib.kicad_sym")).unwrap(),
            repo.read_blob(&repo.head_tree().unwrap().get("lib.kicad_sym").unwrap().object_id)
                .unwrap()
        );
    }

    #[test]
    fn pruning_many_commits_lists_store_a_bounded_number_of_times() {
        let dir = TempDir::new().unwrap();
        let listings = Arc::new(AtomicUsize::new(0));
        let repo = ProjectRepository::with_stores(
            dir.path(),
            Box::new(ListingCounter {
                inner: InMemoryObjectStore::new(),
                listings: Arc::clone(&listings),
            }),
            Box::new(InMemoryRefStore::new()),
        );
        for seed in 0..30 {
            autosave(&dir, &repo, seed, 8 * 1024);
        }
        listings.store(0, Ordering::SeqCst);

        let report = enforce_size_limit(&repo, 32 * 1024).unwrap();
        assert!(report.commits_pruned >= 20);
        assert!(report.within_budget);
        // total before, one index pass, total after
        assert_eq!(listings.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn unreachable_objects_are_swept_without_pruning() {
        let dir = TempDir::new().unwrap();
        let repo = ProjectRepository::init(dir.path()).unwrap();
        let head = autosave(&dir, &repo, 1, 1024);
        let orphan = repo
            .objects()
            .write(&lochist_store::Blob::new(noise(2, 64 * 1024)).to_stored_object())
            .unwrap();

        let report = enforce_size_limit(&repo, 16 * 1024).unwrap();
        assert_eq!(report.commits_pruned, 0);
        assert_eq!(report.objects_removed, 1);
        assert!(!repo.objects().exists(&orphan).unwrap());
        assert_eq!(repo.head().unwrap(), Some(head));
    }
}
