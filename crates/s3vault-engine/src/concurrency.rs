//! Per-object write serialization.
//!
//! S3 semantics require that concurrent writes to the same `(bucket, key,
//! version_id)` triple commit atomically relative to each other: a reader
//! must never observe a partially-applied write, and two concurrent PUTs to
//! the same key must not interleave. [`ObjectLockTable`] hands out RAII
//! guards scoped to a composite key so handlers can bracket the read-modify-
//! write sequence (validate preconditions, write body, update version
//! metadata) without holding a single lock across the whole bucket.
//!
//! The lock is a [`tokio::sync::RwLock`] rather than [`parking_lot`] because
//! guards here are held across `.await` points (storage I/O); a
//! `parking_lot::RwLock` guard is `!Send` and cannot cross an await boundary
//! under the current Rust compiler.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Composite key identifying the object a lock guards.
type ObjectKey = (String, String, Option<String>);

/// Holds an exclusive lock on a single `(bucket, key, version_id)` triple for
/// the lifetime of a write operation.
///
/// Dropping the guard releases the lock. The guard does not itself carry any
/// data; it exists purely to serialize concurrent writers.
#[must_use]
pub struct ObjectWriteGuard {
    _lock: OwnedRwLockWriteGuard<()>,
}

/// Holds a shared lock on a single `(bucket, key, version_id)` triple,
/// allowing concurrent readers but excluding writers for the duration.
#[must_use]
pub struct ObjectReadGuard {
    _lock: OwnedRwLockReadGuard<()>,
}

/// Table of per-object locks, keyed by `(bucket, key, version_id)`.
///
/// Locks are created lazily on first use and are never removed: the entry
/// count is bounded by the number of distinct objects ever touched during
/// the process lifetime, which is acceptable for an in-memory emulator.
#[derive(Debug, Default)]
pub struct ObjectLockTable {
    locks: DashMap<ObjectKey, Arc<RwLock<()>>>,
}

impl ObjectLockTable {
    /// Create a new, empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquire an exclusive (writer) guard for the given object.
    ///
    /// Blocks until any other readers or writers for the same key have
    /// released their guard.
    pub async fn write(&self, bucket: &str, key: &str, version_id: Option<&str>) -> ObjectWriteGuard {
        let lock = self.lock_for(bucket, key, version_id);
        let guard = lock.write_owned().await;
        ObjectWriteGuard { _lock: guard }
    }

    /// Acquire a shared (reader) guard for the given object.
    ///
    /// Multiple readers may hold a guard for the same key simultaneously;
    /// acquisition blocks only while a writer holds the guard.
    pub async fn read(&self, bucket: &str, key: &str, version_id: Option<&str>) -> ObjectReadGuard {
        let lock = self.lock_for(bucket, key, version_id);
        let guard = lock.read_owned().await;
        ObjectReadGuard { _lock: guard }
    }

    /// Drop the lock entry for an object, e.g. after the object has been
    /// permanently deleted. This is an optimization to bound table growth;
    /// skipping it is always safe.
    pub fn forget(&self, bucket: &str, key: &str, version_id: Option<&str>) {
        self.locks
            .remove(&(bucket.to_owned(), key.to_owned(), version_id.map(str::to_owned)));
    }

    fn lock_for(&self, bucket: &str, key: &str, version_id: Option<&str>) -> Arc<RwLock<()>> {
        let composite = (
            bucket.to_owned(),
            key.to_owned(),
            version_id.map(str::to_owned),
        );
        self.locks
            .entry(composite)
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Number of distinct object keys that currently have a lock entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether the table has no lock entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_should_serialize_concurrent_writers() {
        let table = Arc::new(ObjectLockTable::new());
        let counter = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let table = table.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let _guard = table.write("bucket", "key", None).await;
                let before = counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
                assert_eq!(counter.load(Ordering::SeqCst), before + 1);
            }));
        }

        for handle in handles {
            handle.await.expect("task should not panic");
        }

        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_should_allow_concurrent_readers() {
        let table = ObjectLockTable::new();
        let _r1 = table.read("bucket", "key", Some("v1")).await;
        let _r2 = table.read("bucket", "key", Some("v1")).await;
        // Both guards held simultaneously without deadlock.
    }

    #[tokio::test]
    async fn test_should_isolate_different_keys() {
        let table = ObjectLockTable::new();
        let _g1 = table.write("bucket", "a", None).await;
        // A write guard for a different key must not block on the first.
        let _g2 = table.write("bucket", "b", None).await;
    }

    #[tokio::test]
    async fn test_should_track_lock_table_size() {
        let table = ObjectLockTable::new();
        assert!(table.is_empty());
        {
            let _g = table.write("bucket", "a", Some("v1")).await;
        }
        assert_eq!(table.len(), 1);
        table.forget("bucket", "a", Some("v1"));
        assert!(table.is_empty());
    }
}
