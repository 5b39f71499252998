//! Reconciliation between the local record store and the remote store.
//!
//! Every mutation commits locally before the matching remote call. Remote
//! failures are logged and folded into the record's sync status; they never
//! reach the caller. Local store failures from that first commit always do.
//! Later bookkeeping writes (status write-back, caching fetched records) are
//! logged instead.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};

use super::report::{BatchReport, DrainReport};
use super::transition::{transition, Outcome, SyncOp};
use crate::connectivity::NetworkStatus;
use crate::error::{Error, Result};
use crate::models::{generate_record_key, Record};
use crate::remote::{RemoteDocument, RemoteStore};
use crate::services::{RecordStore, RecordSubscription};

/// Sync policy over a record store and a remote store.
///
/// Cheap to clone; clones share the store, the remote client, the network
/// flag and the background job set.
#[derive(Clone)]
pub struct Coordinator {
    store: RecordStore,
    remote: Arc<dyn RemoteStore>,
    network: NetworkStatus,
    jobs: Arc<Mutex<JoinSet<()>>>,
    active: Arc<watch::Sender<usize>>,
}

impl Coordinator {
    pub fn new(store: RecordStore, remote: Arc<dyn RemoteStore>, network: NetworkStatus) -> Self {
        Self {
            store,
            remote,
            network,
            jobs: Arc::new(Mutex::new(JoinSet::new())),
            active: Arc::new(watch::channel(0).0),
        }
    }

    pub const fn store(&self) -> &RecordStore {
        &self.store
    }

    pub const fn network(&self) -> &NetworkStatus {
        &self.network
    }

    pub fn is_online(&self) -> bool {
        self.network.is_online()
    }

    /// Update the network flag. Never drains on its own.
    pub fn set_network_status(&self, available: bool) {
        let previous = self.network.set(available);
        if previous != available {
            tracing::debug!("Network status set to {}", if available { "online" } else { "offline" });
        }
    }

    /// Live view of every local record.
    ///
    /// When online a background refresh pulls every remote document and
    /// stores it as synced. The refresh replaces local records with the same
    /// id even if they carry an unpushed mutation.
    pub fn list(&self) -> RecordSubscription {
        let subscription = self.store.subscribe_all();
        if self.is_online() {
            let coordinator = self.clone();
            self.spawn_job(async move {
                coordinator.refresh_from_remote().await;
            });
        }
        subscription
    }

    /// Local record first, then the remote copy when online.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Record>> {
        if let Some(record) = self.store.get_by_id(id).await? {
            return Ok(Some(record));
        }
        if id.is_empty() || !self.is_online() {
            return Ok(None);
        }

        match self.remote.fetch_one(id).await {
            Ok(Some(document)) => {
                let record = document.into_record(id);
                match self.store.upsert(&record).await {
                    Ok(()) => tracing::debug!("Cached remote record {id}"),
                    Err(error) => tracing::warn!("Failed to cache remote record {id}: {error}"),
                }
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(error) => {
                tracing::warn!("Failed to fetch remote record {id}: {error}");
                Ok(None)
            }
        }
    }

    /// Create a record, assigning an id when it has none.
    ///
    /// Returns the record as stored, carrying its final id and status.
    pub async fn add(&self, mut record: Record) -> Result<Record> {
        let online = self.is_online();
        if !record.has_id() {
            record.id = if online {
                self.remote.generate_key()
            } else {
                generate_record_key()
            };
        }

        stamp(&mut record, SyncOp::Insert, Outcome::local(online));
        self.store.upsert(&record).await?;
        tracing::debug!("Stored record {} as {}", record.id, record.sync_status);

        if online {
            self.push(&mut record, SyncOp::Insert).await;
        }
        Ok(record)
    }

    /// Replace an existing record. Field values are never rolled back.
    pub async fn update(&self, mut record: Record) -> Result<Record> {
        let online = self.is_online();
        stamp(&mut record, SyncOp::Update, Outcome::local(online));
        self.store.update(&record).await?;
        tracing::debug!("Updated record {} as {}", record.id, record.sync_status);

        if online {
            self.push(&mut record, SyncOp::Update).await;
        }
        Ok(record)
    }

    /// Delete locally, then remove remotely when online.
    ///
    /// Local deletion is final. Returns whether a local row was removed.
    pub async fn delete(&self, record: &Record) -> Result<bool> {
        let removed = self.store.delete(record).await?;
        if !record.has_id() {
            return Ok(removed);
        }

        if self.is_online() {
            if let Err(error) = self.remote.remove(&record.id).await {
                tracing::warn!("Failed to remove remote record {}: {error}", record.id);
            }
        } else {
            tracing::info!(
                "Deleted record {} while offline; its remote copy is left in place",
                record.id
            );
        }
        Ok(removed)
    }

    /// Push every pending mutation: inserts, then updates, then deletes.
    ///
    /// A record whose remote call fails keeps its status and the drain moves
    /// on. Running it again after a clean drain makes no remote calls.
    pub async fn drain_pending(&self) -> DrainReport {
        if !self.is_online() {
            tracing::debug!("Skipping drain while offline");
            return DrainReport::offline();
        }

        let report = DrainReport {
            skipped_offline: false,
            inserts: self.drain_batch(SyncOp::Insert).await,
            updates: self.drain_batch(SyncOp::Update).await,
            deletes: self.drain_batch(SyncOp::Delete).await,
        };

        if report.attempted() > 0 || !report.is_clean() {
            tracing::info!("Drained pending mutations: {report}");
        }
        report
    }

    /// Queue a drain on the background job set.
    pub fn spawn_drain(&self) {
        let coordinator = self.clone();
        self.spawn_job(async move {
            coordinator.drain_pending().await;
        });
    }

    /// Wait for every background job, including ones queued while waiting.
    ///
    /// Cancelling the returned future leaves the jobs running.
    pub async fn wait_idle(&self) {
        self.until_no_active_jobs().await;
        self.reap_finished();
    }

    /// Abort every background job and wait for them to stop.
    pub async fn shutdown(&self) {
        self.lock_jobs().abort_all();
        self.until_no_active_jobs().await;
        self.reap_finished();
    }

    /// Number of background jobs still running.
    pub fn pending_jobs(&self) -> usize {
        *self.active.borrow()
    }

    async fn refresh_from_remote(&self) {
        let documents = match self.remote.fetch_all().await {
            Ok(documents) => documents,
            Err(error) => {
                tracing::warn!("Remote refresh failed: {error}");
                return;
            }
        };

        let total = documents.len();
        let mut stored = 0;
        for (id, document) in documents {
            match self.store.upsert(&document.into_record(id.as_str())).await {
                Ok(()) => stored += 1,
                Err(error) => tracing::warn!("Failed to cache remote record {id}: {error}"),
            }
        }
        tracing::debug!("Refreshed {stored}/{total} records from remote");
    }

    async fn drain_batch(&self, op: SyncOp) -> BatchReport {
        let mut report = BatchReport::default();
        let records = match self.store.list_by_status(op.pending_status()).await {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!("Failed to read {} batch: {error}", op.pending_status());
                report.read_failed = true;
                return report;
            }
        };

        for record in records {
            let id = record.id.clone();
            match self.drain_one(op, record).await {
                Ok(succeeded) => report.record(succeeded),
                Err(error) => {
                    tracing::warn!("Failed to settle record {id} after drain: {error}");
                    report.record(false);
                }
            }
        }
        report
    }

    /// Replicate one pending record. `Ok(false)` means the remote call failed.
    async fn drain_one(&self, op: SyncOp, record: Record) -> Result<bool> {
        let result = match op {
            SyncOp::Insert | SyncOp::Update => {
                self.remote
                    .put(&record.id, &RemoteDocument::from_record(&record))
                    .await
            }
            SyncOp::Delete if !record.has_id() => Ok(()),
            SyncOp::Delete => self.remote.remove(&record.id).await,
        };

        let outcome = match result {
            Ok(()) => Outcome::RemoteOk,
            Err(error) => {
                tracing::warn!("Drain of record {} failed: {error}", record.id);
                Outcome::RemoteFailed
            }
        };

        match transition(record.sync_status, op, outcome) {
            None => {
                self.store.delete(&record).await?;
            }
            Some(next) if next != record.sync_status => {
                // Only the status moves, and only if nobody touched the row
                // while the remote call was in flight.
                if !self.store.set_status_if_unchanged(&record, next).await? {
                    tracing::debug!("Record {} changed during drain; left as is", record.id);
                }
            }
            Some(_) => {}
        }
        Ok(outcome == Outcome::RemoteOk)
    }

    /// Put the record remotely and write back the resulting status.
    ///
    /// The whole record is rewritten so local state converges on whatever
    /// the last completed put sent.
    async fn push(&self, record: &mut Record, op: SyncOp) {
        let outcome = match self
            .remote
            .put(&record.id, &RemoteDocument::from_record(record))
            .await
        {
            Ok(()) => Outcome::RemoteOk,
            Err(error) => {
                tracing::warn!("Remote put for record {} failed: {error}", record.id);
                Outcome::RemoteFailed
            }
        };

        stamp(record, op, outcome);
        self.settle(record).await;
    }

    /// Write back a status change. A record deleted in the meantime stays deleted.
    async fn settle(&self, record: &Record) {
        match self.store.update(record).await {
            Ok(()) => {}
            Err(Error::NotFound(id)) => {
                tracing::debug!("Record {id} was deleted before its status could be settled");
            }
            Err(error) => tracing::warn!(
                "Failed to record sync status {} for {}: {error}",
                record.sync_status,
                record.id
            ),
        }
    }

    fn spawn_job<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = ActiveJob::start(&self.active);
        let mut jobs = self.lock_jobs();
        while let Some(result) = jobs.try_join_next() {
            log_job_result(result);
        }
        jobs.spawn(async move {
            let _guard = guard;
            job.await;
        });
    }

    fn reap_finished(&self) {
        let mut jobs = self.lock_jobs();
        while let Some(result) = jobs.try_join_next() {
            log_job_result(result);
        }
    }

    async fn until_no_active_jobs(&self) {
        let mut active = self.active.subscribe();
        // The sender lives in `self`, so the channel stays open.
        let _ = active.wait_for(|count| *count == 0).await;
    }

    fn lock_jobs(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Counts a background job as running until its future is dropped, which
/// covers completion, panics and aborts alike.
struct ActiveJob(Arc<watch::Sender<usize>>);

impl ActiveJob {
    fn start(active: &Arc<watch::Sender<usize>>) -> Self {
        active.send_modify(|count| *count += 1);
        Self(Arc::clone(active))
    }
}

impl Drop for ActiveJob {
    fn drop(&mut self) {
        self.0.send_modify(|count| *count = count.saturating_sub(1));
    }
}

fn stamp(record: &mut Record, op: SyncOp, outcome: Outcome) {
    if let Some(next) = transition(record.sync_status, op, outcome) {
        record.sync_status = next;
    }
}

fn log_job_result(result: std::result::Result<(), JoinError>) {
    if let Err(error) = result {
        if error.is_panic() {
            tracing::error!("Background sync job panicked: {error}");
        }
    }
}
