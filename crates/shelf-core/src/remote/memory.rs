//! In-process remote store with availability and failure controls.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{RemoteDocument, RemoteError, RemoteResult, RemoteStore};

/// Number of calls made against a `MemoryRemoteStore`, per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteCallCounts {
    pub fetch_all: usize,
    pub fetch_one: usize,
    pub put: usize,
    pub remove: usize,
}

impl RemoteCallCounts {
    pub const fn total(&self) -> usize {
        self.fetch_all + self.fetch_one + self.put + self.remove
    }
}

/// Remote document collection held in memory.
///
/// Calls fail with `RemoteError::Unavailable` while the store is marked
/// unavailable, and mutations fail for ids registered with `fail_id`.
pub struct MemoryRemoteStore {
    documents: Mutex<BTreeMap<String, RemoteDocument>>,
    available: AtomicBool,
    failing_ids: Mutex<HashSet<String>>,
    put_delays: Mutex<VecDeque<Duration>>,
    fetch_all_calls: AtomicUsize,
    fetch_one_calls: AtomicUsize,
    put_calls: AtomicUsize,
    remove_calls: AtomicUsize,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(BTreeMap::new()),
            available: AtomicBool::new(true),
            failing_ids: Mutex::new(HashSet::new()),
            put_delays: Mutex::new(VecDeque::new()),
            fetch_all_calls: AtomicUsize::new(0),
            fetch_one_calls: AtomicUsize::new(0),
            put_calls: AtomicUsize::new(0),
            remove_calls: AtomicUsize::new(0),
        }
    }

    /// Seed a document without counting a call.
    pub fn insert_document(&self, id: impl Into<String>, document: RemoteDocument) {
        lock(&self.documents).insert(id.into(), document);
    }

    pub fn document(&self, id: &str) -> Option<RemoteDocument> {
        lock(&self.documents).get(id).cloned()
    }

    pub fn documents(&self) -> BTreeMap<String, RemoteDocument> {
        lock(&self.documents).clone()
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Make every `put` and `remove` for `id` fail until cleared.
    pub fn fail_id(&self, id: impl Into<String>) {
        lock(&self.failing_ids).insert(id.into());
    }

    pub fn clear_failures(&self) {
        lock(&self.failing_ids).clear();
    }

    /// Delay the next `put` call by `delay`. Queued delays apply in call order.
    pub fn push_put_delay(&self, delay: Duration) {
        lock(&self.put_delays).push_back(delay);
    }

    pub fn call_counts(&self) -> RemoteCallCounts {
        RemoteCallCounts {
            fetch_all: self.fetch_all_calls.load(Ordering::SeqCst),
            fetch_one: self.fetch_one_calls.load(Ordering::SeqCst),
            put: self.put_calls.load(Ordering::SeqCst),
            remove: self.remove_calls.load(Ordering::SeqCst),
        }
    }

    pub fn reset_counts(&self) {
        for counter in [
            &self.fetch_all_calls,
            &self.fetch_one_calls,
            &self.put_calls,
            &self.remove_calls,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }

    fn ensure_available(&self) -> RemoteResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(RemoteError::Unavailable(
                "memory remote is switched off".to_string(),
            ))
        }
    }

    fn ensure_writable(&self, id: &str) -> RemoteResult<()> {
        self.ensure_available()?;
        if lock(&self.failing_ids).contains(id) {
            return Err(RemoteError::Api {
                status: 500,
                message: format!("injected failure for '{id}'"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch_all(&self) -> RemoteResult<Vec<(String, RemoteDocument)>> {
        self.fetch_all_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        Ok(lock(&self.documents)
            .iter()
            .map(|(id, document)| (id.clone(), document.clone()))
            .collect())
    }

    async fn fetch_one(&self, id: &str) -> RemoteResult<Option<RemoteDocument>> {
        self.fetch_one_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        Ok(lock(&self.documents).get(id).cloned())
    }

    async fn put(&self, id: &str, document: &RemoteDocument) -> RemoteResult<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let delay = lock(&self.put_delays).pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.ensure_writable(id)?;
        lock(&self.documents).insert(id.to_string(), document.clone());
        Ok(())
    }

    async fn remove(&self, id: &str) -> RemoteResult<()> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_writable(id)?;
        lock(&self.documents).remove(id);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
