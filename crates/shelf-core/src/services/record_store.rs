//! Shared record store service used by the coordinator and clients.
//!
//! Wraps the blocking `SQLite` repository behind an async, cloneable handle.
//! Every call runs on tokio's blocking pool so callers never stall their own
//! executor thread. Writes republish the full record set to subscribers.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::db::{Database, RecordRepository, SqliteRecordRepository};
use crate::error::{Error, Result};
use crate::models::{Record, SyncStatus};

type Snapshot = Arc<Vec<Record>>;

/// Thread-safe handle to the local record table.
#[derive(Clone)]
pub struct RecordStore {
    inner: Arc<Inner>,
}

struct Inner {
    db: Mutex<Database>,
    db_path: Option<PathBuf>,
    snapshots: watch::Sender<Snapshot>,
}

impl RecordStore {
    /// Open a record store at the given filesystem path.
    pub async fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let open_path = db_path.clone();
        let db = tokio::task::spawn_blocking(move || Database::open(&open_path))
            .await
            .map_err(|error| Error::Database(format!("record store open failed: {error}")))??;
        Self::from_database(db, Some(db_path))
    }

    /// Open an in-memory record store (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        Self::from_database(Database::open_in_memory()?, None)
    }

    fn from_database(db: Database, db_path: Option<PathBuf>) -> Result<Self> {
        let initial = SqliteRecordRepository::new(db.connection()).list_all()?;
        let (snapshots, _) = watch::channel(Arc::new(initial));
        Ok(Self {
            inner: Arc::new(Inner {
                db: Mutex::new(db),
                db_path,
                snapshots,
            }),
        })
    }

    /// Filesystem location, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.inner.db_path.as_deref()
    }

    /// Point-in-time snapshot of every record.
    pub async fn list_all(&self) -> Result<Vec<Record>> {
        self.read(|repo| repo.list_all()).await
    }

    /// Live view of the full record set.
    ///
    /// Yields the current snapshot first, then a new snapshot after every
    /// change. Each call returns an independent subscriber.
    pub fn subscribe_all(&self) -> RecordSubscription {
        RecordSubscription {
            rx: self.inner.snapshots.subscribe(),
            primed: false,
        }
    }

    /// Fetch a record by id.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Record>> {
        let id = id.to_string();
        self.read(move |repo| repo.get(&id)).await
    }

    /// Insert or replace a record.
    pub async fn upsert(&self, record: &Record) -> Result<()> {
        let record = record.clone();
        self.write(move |repo| repo.upsert(&record)).await
    }

    /// Replace an existing record; `Error::NotFound` when absent.
    pub async fn update(&self, record: &Record) -> Result<()> {
        let record = record.clone();
        self.write(move |repo| repo.update(&record)).await
    }

    /// Move `record` to `status` if its row has not changed since it was read.
    ///
    /// Returns `false` when the row was edited, re-stamped or deleted meanwhile.
    pub async fn set_status_if_unchanged(
        &self,
        record: &Record,
        status: SyncStatus,
    ) -> Result<bool> {
        let record = record.clone();
        self.write(move |repo| repo.set_status_if_unchanged(&record, status))
            .await
    }

    /// Delete a record. Deleting an absent record is a no-op returning `false`.
    pub async fn delete(&self, record: &Record) -> Result<bool> {
        let id = record.id.clone();
        self.write(move |repo| repo.delete(&id)).await
    }

    /// Records with exactly the given status.
    pub async fn list_by_status(&self, status: SyncStatus) -> Result<Vec<Record>> {
        self.read(move |repo| repo.list_by_status(status)).await
    }

    /// Records whose status differs from the given one.
    pub async fn list_by_status_not(&self, status: SyncStatus) -> Result<Vec<Record>> {
        self.read(move |repo| repo.list_by_status_not(status)).await
    }

    /// Records owned by `owner_id`.
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Record>> {
        let owner_id = owner_id.to_string();
        self.read(move |repo| repo.list_by_owner(&owner_id)).await
    }

    /// Record counts per status.
    pub async fn count_by_status(&self) -> Result<Vec<(SyncStatus, usize)>> {
        self.read(|repo| repo.count_by_status()).await
    }

    /// Ids starting with `prefix`, at most `limit` of them.
    pub async fn list_ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<String>> {
        let prefix = prefix.to_string();
        self.read(move |repo| repo.list_ids_by_prefix(&prefix, limit))
            .await
    }

    async fn read<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteRecordRepository<'_>) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let db = inner.lock_db()?;
            op(&SqliteRecordRepository::new(db.connection()))
        })
        .await
        .map_err(|error| Error::Database(format!("record store task failed: {error}")))?
    }

    /// Run a mutation, then publish the resulting snapshot while still holding
    /// the connection so subscribers observe writes in commit order.
    async fn write<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteRecordRepository<'_>) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let db = inner.lock_db()?;
            let repo = SqliteRecordRepository::new(db.connection());
            let output = op(&repo)?;
            match repo.list_all() {
                Ok(snapshot) => inner.publish(snapshot),
                Err(error) => tracing::warn!("Failed to refresh record snapshot: {error}"),
            }
            Ok(output)
        })
        .await
        .map_err(|error| Error::Database(format!("record store task failed: {error}")))?
    }
}

impl Inner {
    fn lock_db(&self) -> Result<std::sync::MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| Error::Database("record store lock poisoned".to_string()))
    }

    fn publish(&self, snapshot: Vec<Record>) {
        self.snapshots.send_if_modified(|current| {
            if current.as_slice() == snapshot.as_slice() {
                false
            } else {
                *current = Arc::new(snapshot);
                true
            }
        });
    }
}

/// A live, restartable view of the full record set.
///
/// Consecutive identical snapshots are never delivered twice.
pub struct RecordSubscription {
    rx: watch::Receiver<Snapshot>,
    primed: bool,
}

impl RecordSubscription {
    /// Wait for the next snapshot.
    ///
    /// The first call resolves immediately with the current set. Returns
    /// `None` once the store has been dropped.
    pub async fn next(&mut self) -> Option<Snapshot> {
        if !self.primed {
            self.primed = true;
            return Some(Arc::clone(&self.rx.borrow_and_update()));
        }
        self.rx.changed().await.ok()?;
        Some(Arc::clone(&self.rx.borrow_and_update()))
    }

    /// The latest snapshot without waiting.
    pub fn current(&self) -> Snapshot {
        Arc::clone(&self.rx.borrow())
    }
}

impl Clone for RecordSubscription {
    /// A clone starts over at the current snapshot.
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
            primed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::tempdir;

    fn record(id: &str, title: &str) -> Record {
        Record::new("u1").with_id(id).with_field("title", title)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_upsert_and_list_roundtrip() {
        let store = RecordStore::open_in_memory().unwrap();

        store.upsert(&record("b1", "hello shelf")).await.unwrap();
        let records = store.list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("title").unwrap().as_str(), Some("hello shelf"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn subscription_starts_with_current_snapshot() {
        let store = RecordStore::open_in_memory().unwrap();
        store.upsert(&record("b1", "first")).await.unwrap();

        let mut subscription = store.subscribe_all();
        let snapshot = subscription.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn subscription_observes_each_change() {
        let store = RecordStore::open_in_memory().unwrap();
        let mut subscription = store.subscribe_all();
        assert!(subscription.next().await.unwrap().is_empty());

        store.upsert(&record("b1", "first")).await.unwrap();
        let snapshot = tokio::time::timeout(Duration::from_secs(5), subscription.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.len(), 1);

        store.delete(&record("b1", "first")).await.unwrap();
        let snapshot = tokio::time::timeout(Duration::from_secs(5), subscription.next())
            .await
            .unwrap()
            .unwrap();
        assert!(snapshot.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn identical_writes_are_not_redelivered() {
        let store = RecordStore::open_in_memory().unwrap();
        store.upsert(&record("b1", "same")).await.unwrap();

        let mut subscription = store.subscribe_all();
        subscription.next().await.unwrap();

        store.upsert(&record("b1", "same")).await.unwrap();
        let waited = tokio::time::timeout(Duration::from_millis(100), subscription.next()).await;
        assert!(waited.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn subscribers_are_independent() {
        let store = RecordStore::open_in_memory().unwrap();
        let mut first = store.subscribe_all();
        let mut second = store.subscribe_all();
        first.next().await.unwrap();

        store.upsert(&record("b1", "x")).await.unwrap();

        assert_eq!(first.next().await.unwrap().len(), 1);
        // The second subscriber has not consumed anything yet and starts at the latest set
        assert_eq!(second.next().await.unwrap().len(), 1);
        assert_eq!(second.clone().next().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_missing_is_noop() {
        let store = RecordStore::open_in_memory().unwrap();
        assert!(!store.delete(&record("nope", "x")).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn file_store_survives_reopen() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("shelf.db");

        {
            let store = RecordStore::open(&db_path).await.unwrap();
            store
                .upsert(&record("b1", "durable").with_status(SyncStatus::PendingInsert))
                .await
                .unwrap();
            assert_eq!(store.path(), Some(db_path.as_path()));
        }

        let store = RecordStore::open(&db_path).await.unwrap();
        let pending = store.list_by_status(SyncStatus::PendingInsert).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(store.subscribe_all().current().len(), 1);
    }
}
