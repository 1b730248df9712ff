use lochist_types::ObjectId;

use crate::error::StoreResult;
use crate::object::StoredObject;

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written: the same data always produces the
///   same ID, and writing an existing object is a no-op.
/// - Concurrent reads are always safe.
/// - The store never interprets object contents.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Read an object by its content-addressed ID.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    /// Returns `Err` on I/O failure or data corruption.
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>>;

    /// Write an object and return its content-addressed ID.
    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId>;

    /// Check whether an object exists in the store.
    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Delete an object by ID. Returns `true` if the object existed.
    ///
    /// Only retention sweeps call this. Deleting a referenced object
    /// corrupts the history.
    fn delete(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Bytes the object occupies in the backend, or `None` if absent.
    fn stored_size(&self, id: &ObjectId) -> StoreResult<Option<u64>>;

    /// Every object id currently held, sorted.
    fn list_ids(&self) -> StoreResult<Vec<ObjectId>>;

    /// Total bytes occupied by all objects.
    fn total_bytes(&self) -> StoreResult<u64> {
        let mut total = 0;
        for id in self.list_ids()? {
            total += self.stored_size(&id)?.unwrap_or(0);
        }
        Ok(total)
    }

    /// Write multiple objects and return their IDs.
    fn write_batch(&self, objects: &[StoredObject]) -> StoreResult<Vec<ObjectId>> {
        objects.iter().map(|obj| self.write(obj)).collect()
    }
}
