//! Sync controller: mirrors the remote collection into the [`RecordStore`].
//!
//! Every mutation is applied by one worker task that drains a command queue
//! in order. A bulk fetch is awaited inside the worker, so change
//! notifications that arrive meanwhile wait in the queue and are applied
//! after it; stale fetch results can never overwrite fresher patches.
//!
//! Change events are reconciled according to the controller's
//! [`ReconcilePolicy`], fixed at construction:
//! - `Refetch`: any event triggers a full fetch that replaces the store.
//! - `Incremental`: inserts/updates are upserted and deletes removed by id.
//!
//! `stop_listening` drops queued notifications from the released
//! subscription. A fetch already in flight completes and is applied.

use crate::error::SyncError;
use crate::source::{ChangeStream, RecordSource};
use crate::stats::{Stats, compute_stats};
use crate::store::{RecordStore, StoreObserver};
use crate::view::{DashboardView, Route};
use callboard_rs_config::{ReconcilePolicy, SyncConfig};
use callboard_rs_protocol::{CallRecord, ChangeEvent};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Which side of the sync failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A bulk fetch failed; the previous snapshot is still shown.
    Load,
    /// The change subscription failed or dropped; updates are fetch-only.
    Subscription,
}

/// Most recent absorbed failure.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncFailure {
    pub kind: FailureKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl SyncFailure {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Observable state of the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    /// True until the first fetch has resolved, successfully or not.
    pub loading: bool,
    /// A change subscription is active.
    pub listening: bool,
    pub last_error: Option<SyncFailure>,
    /// Time the store last changed from remote data.
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            loading: true,
            listening: false,
            last_error: None,
            last_synced_at: None,
        }
    }
}

enum Command {
    Refetch {
        trigger: &'static str,
        done: Option<oneshot::Sender<()>>,
    },
    Apply {
        epoch: u64,
        event: ChangeEvent,
    },
    FeedEnded {
        epoch: u64,
        reason: String,
    },
    Barrier(oneshot::Sender<()>),
}

struct Shared {
    source: Arc<dyn RecordSource>,
    policy: ReconcilePolicy,
    store: Mutex<RecordStore>,
    status: watch::Sender<SyncStatus>,
    /// Epoch of the active subscription, `0` when not listening.
    active_epoch: AtomicU64,
    next_epoch: AtomicU64,
}

/// Owns the store and keeps it consistent with a [`RecordSource`].
///
/// Must be created inside a Tokio runtime; construction spawns the worker.
pub struct SyncController {
    shared: Arc<Shared>,
    commands: mpsc::Sender<Command>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SyncController {
    pub fn new(source: Arc<dyn RecordSource>, config: &SyncConfig) -> Self {
        let (status, _) = watch::channel(SyncStatus::default());
        let shared = Arc::new(Shared {
            source,
            policy: config.policy,
            store: Mutex::new(RecordStore::new()),
            status,
            active_epoch: AtomicU64::new(0),
            next_epoch: AtomicU64::new(1),
        });
        let (commands, receiver) = mpsc::channel(config.queue_capacity.max(1));
        tokio::spawn(run_worker(shared.clone(), receiver));
        info!(
            "sync controller started (policy={:?}, queue_capacity={})",
            config.policy, config.queue_capacity
        );
        Self {
            shared,
            commands,
            listener: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> ReconcilePolicy {
        self.shared.policy
    }

    /// Register a store observer, notified after every later mutation.
    pub fn add_observer(&self, observer: Arc<dyn StoreObserver>) {
        self.shared.store.lock().add_observer(observer);
    }

    /// Copy of the current ordered records.
    pub fn snapshot(&self) -> Vec<CallRecord> {
        self.shared.store.lock().snapshot().to_vec()
    }

    pub fn stats(&self) -> Stats {
        compute_stats(self.shared.store.lock().snapshot())
    }

    /// Projection for `route` over the current snapshot.
    pub fn view(&self, route: Route) -> DashboardView {
        let loading = self.shared.status.borrow().loading;
        DashboardView::project(route, self.shared.store.lock().snapshot(), loading)
    }

    pub fn status(&self) -> SyncStatus {
        self.shared.status.borrow().clone()
    }

    /// Receiver that observes every status change.
    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.shared.status.subscribe()
    }

    /// Load every record once and wait for the result.
    ///
    /// Failures are absorbed: the store keeps its previous contents and the
    /// returned status carries a [`FailureKind::Load`] error.
    pub async fn initialize(&self) -> SyncStatus {
        let (done, finished) = oneshot::channel();
        let command = Command::Refetch {
            trigger: "initialize",
            done: Some(done),
        };
        if self.commands.send(command).await.is_err() {
            warn!("initialize skipped: sync worker stopped");
        } else {
            let _ = finished.await;
        }
        self.status()
    }

    /// Queue a full refetch without waiting for it.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        self.commands
            .send(Command::Refetch {
                trigger: "refresh",
                done: None,
            })
            .await
            .map_err(|_| SyncError::WorkerStopped)
    }

    /// Wait until every command queued before this call has been applied.
    pub async fn settle(&self) -> Result<(), SyncError> {
        let (done, finished) = oneshot::channel();
        self.commands
            .send(Command::Barrier(done))
            .await
            .map_err(|_| SyncError::WorkerStopped)?;
        finished.await.map_err(|_| SyncError::WorkerStopped)
    }

    /// Open the change subscription and run the initial load side by side.
    ///
    /// The load never waits on the subscription, so a slow or unreachable
    /// realtime endpoint only delays live updates. A subscription failure is
    /// absorbed into the returned status like a load failure.
    pub async fn start(&self) -> SyncStatus {
        let (subscribed, _) = tokio::join!(self.start_listening(), self.initialize());
        if let Err(err) = subscribed {
            warn!("live updates disabled (error={})", err);
        }
        self.status()
    }

    pub fn is_listening(&self) -> bool {
        self.shared.active_epoch.load(Ordering::SeqCst) != 0
    }

    /// Open the change subscription unless one is already active.
    ///
    /// On failure the controller keeps working fetch-only; the error is
    /// recorded in the status and returned for the caller to log.
    pub async fn start_listening(&self) -> Result<(), SyncError> {
        if self.is_listening() {
            debug!("start_listening ignored: already listening");
            return Ok(());
        }
        let stream = match self.shared.source.subscribe().await {
            Ok(stream) => stream,
            Err(err) => {
                warn!("change subscription failed; continuing fetch-only (error={})", err);
                self.shared.status.send_modify(|status| {
                    status.listening = false;
                    status.last_error =
                        Some(SyncFailure::new(FailureKind::Subscription, err.to_string()));
                });
                return Err(SyncError::Subscription(err));
            }
        };

        let mut listener = self.listener.lock();
        if self.is_listening() {
            debug!("concurrent subscription already active; releasing duplicate");
            return Ok(());
        }
        if let Some(stale) = listener.take() {
            stale.abort();
        }
        let epoch = self.shared.next_epoch.fetch_add(1, Ordering::SeqCst);
        self.shared.active_epoch.store(epoch, Ordering::SeqCst);
        *listener = Some(tokio::spawn(forward_changes(
            stream,
            self.commands.clone(),
            epoch,
        )));
        self.shared.status.send_modify(|status| {
            status.listening = true;
            if matches!(&status.last_error, Some(failure) if failure.kind == FailureKind::Subscription)
            {
                status.last_error = None;
            }
        });
        info!("listening for changes (epoch={})", epoch);
        Ok(())
    }

    /// Release the subscription. Safe to call repeatedly or before starting.
    pub fn stop_listening(&self) {
        let handle = self.listener.lock().take();
        let previous = self.shared.active_epoch.swap(0, Ordering::SeqCst);
        if let Some(handle) = handle {
            handle.abort();
        }
        if previous != 0 {
            info!("stopped listening for changes (epoch={})", previous);
            self.shared
                .status
                .send_modify(|status| status.listening = false);
        }
    }
}

impl Drop for SyncController {
    fn drop(&mut self) {
        self.stop_listening();
    }
}

impl Shared {
    fn is_current(&self, epoch: u64) -> bool {
        epoch != 0 && self.active_epoch.load(Ordering::SeqCst) == epoch
    }

    async fn refetch(&self, trigger: &str) {
        match self.source.fetch_all().await {
            Ok(records) => {
                let len = {
                    let mut store = self.store.lock();
                    store.replace_all(records);
                    store.len()
                };
                info!("store refreshed (trigger={}, len={})", trigger, len);
                self.status.send_modify(|status| {
                    status.loading = false;
                    status.last_synced_at = Some(Utc::now());
                    if matches!(&status.last_error, Some(failure) if failure.kind == FailureKind::Load)
                    {
                        status.last_error = None;
                    }
                });
            }
            Err(err) => {
                warn!(
                    "record fetch failed; keeping previous snapshot (trigger={}, error={})",
                    trigger, err
                );
                self.status.send_modify(|status| {
                    status.loading = false;
                    status.last_error = Some(SyncFailure::new(FailureKind::Load, err.to_string()));
                });
            }
        }
    }

    fn apply(&self, event: ChangeEvent) {
        {
            let mut store = self.store.lock();
            match event {
                ChangeEvent::Insert(record) | ChangeEvent::Update(record) => {
                    let id = record.id.clone();
                    let outcome = store.upsert(record);
                    debug!("applied change (id={}, outcome={:?})", id, outcome);
                }
                ChangeEvent::Delete { id } => {
                    if store.remove(&id).is_none() {
                        debug!("delete for unknown record ignored (id={})", id);
                        return;
                    }
                }
            }
        }
        self.status
            .send_modify(|status| status.last_synced_at = Some(Utc::now()));
    }
}

async fn run_worker(shared: Arc<Shared>, mut commands: mpsc::Receiver<Command>) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Refetch { trigger, done } => {
                shared.refetch(trigger).await;
                if let Some(done) = done {
                    let _ = done.send(());
                }
            }
            Command::Apply { epoch, event } => {
                if !shared.is_current(epoch) {
                    debug!(
                        "dropping change from released subscription (epoch={}, id={})",
                        epoch,
                        event.record_id()
                    );
                    continue;
                }
                match shared.policy {
                    ReconcilePolicy::Refetch => shared.refetch(change_trigger(&event)).await,
                    ReconcilePolicy::Incremental => shared.apply(event),
                }
            }
            Command::FeedEnded { epoch, reason } => {
                if shared
                    .active_epoch
                    .compare_exchange(epoch, 0, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    warn!("change feed ended; continuing fetch-only (reason={})", reason);
                    shared.status.send_modify(|status| {
                        status.listening = false;
                        status.last_error = Some(SyncFailure::new(FailureKind::Subscription, reason));
                    });
                }
            }
            Command::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("sync worker stopped");
}

fn change_trigger(event: &ChangeEvent) -> &'static str {
    match event {
        ChangeEvent::Insert(_) => "insert",
        ChangeEvent::Update(_) => "update",
        ChangeEvent::Delete { .. } => "delete",
    }
}

async fn forward_changes(mut stream: ChangeStream, commands: mpsc::Sender<Command>, epoch: u64) {
    let reason = loop {
        match stream.next().await {
            Some(Ok(event)) => {
                if commands.send(Command::Apply { epoch, event }).await.is_err() {
                    return;
                }
            }
            Some(Err(err)) => break err.to_string(),
            None => break "change feed ended".to_string(),
        }
    };
    let _ = commands.send(Command::FeedEnded { epoch, reason }).await;
}
