use async_trait::async_trait;
use callboard_rs_core::{ChangeStream, FeedItem, RecordSource, SourceError};
use callboard_rs_protocol::{CallRecord, ChangeEvent};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, Semaphore, mpsc};

/// Holds fetches or subscribe attempts until the test releases them.
#[derive(Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
    started: Arc<Notify>,
}

impl Gate {
    fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(0)),
            started: Arc::new(Notify::new()),
        }
    }

    /// Wait until a call is parked on the gate.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Let one parked call continue.
    pub fn release(&self) {
        self.permits.add_permits(1);
    }

    async fn pass(&self) {
        self.started.notify_one();
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }
}

#[derive(Default)]
struct State {
    rows: Vec<CallRecord>,
    fetch_failures: VecDeque<String>,
    subscribe_failure: Option<String>,
    feed: Option<mpsc::Sender<FeedItem>>,
    gate: Option<Gate>,
    subscribe_gate: Option<Gate>,
}

/// In-memory [`RecordSource`] driven by the test.
///
/// `fetch_all` returns the current remote rows (read after any gate is
/// released). `subscribe` hands out a channel-backed feed that the test
/// pushes events into.
#[derive(Default)]
pub struct ScriptedSource {
    state: Mutex<State>,
    fetches: AtomicUsize,
    subscriptions: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(rows: Vec<CallRecord>) -> Self {
        let source = Self::default();
        source.set_rows(rows);
        source
    }

    /// Replace the remote collection.
    pub fn set_rows(&self, rows: Vec<CallRecord>) {
        self.state.lock().rows = rows;
    }

    /// Make the next fetch fail with `message`.
    pub fn fail_next_fetch(&self, message: &str) {
        self.state
            .lock()
            .fetch_failures
            .push_back(message.to_string());
    }

    /// Make every subscribe attempt fail with `message`.
    pub fn fail_subscribe(&self, message: &str) {
        self.state.lock().subscribe_failure = Some(message.to_string());
    }

    /// Park subsequent fetches until [`Gate::release`] is called.
    pub fn gate_fetches(&self) -> Gate {
        let gate = Gate::new();
        self.state.lock().gate = Some(gate.clone());
        gate
    }

    /// Park subsequent subscribe attempts until [`Gate::release`] is called.
    pub fn gate_subscribe(&self) -> Gate {
        let gate = Gate::new();
        self.state.lock().subscribe_gate = Some(gate.clone());
        gate
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    /// True while the last handed-out feed still has a live receiver.
    pub fn has_listener(&self) -> bool {
        self.state
            .lock()
            .feed
            .as_ref()
            .is_some_and(|feed| !feed.is_closed())
    }

    /// Deliver a change on the current feed. Returns false if nobody listens.
    pub async fn push(&self, event: ChangeEvent) -> bool {
        let feed = self.state.lock().feed.clone();
        match feed {
            Some(feed) => feed.send(Ok(event)).await.is_ok(),
            None => false,
        }
    }

    /// Terminate the current feed with an error.
    pub async fn break_feed(&self, message: &str) {
        let feed = self.state.lock().feed.take();
        if let Some(feed) = feed {
            let _ = feed
                .send(Err(SourceError::Closed(message.to_string())))
                .await;
        }
    }
}

#[async_trait]
impl RecordSource for ScriptedSource {
    async fn fetch_all(&self) -> Result<Vec<CallRecord>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let gate = self.state.lock().gate.clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        let mut state = self.state.lock();
        if let Some(message) = state.fetch_failures.pop_front() {
            return Err(SourceError::Unavailable(message));
        }
        Ok(state.rows.clone())
    }

    async fn subscribe(&self) -> Result<ChangeStream, SourceError> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let gate = self.state.lock().subscribe_gate.clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        let mut state = self.state.lock();
        if let Some(message) = &state.subscribe_failure {
            return Err(SourceError::Rejected(message.clone()));
        }
        let (tx, rx) = mpsc::channel(32);
        state.feed = Some(tx);
        Ok(ChangeStream::from_receiver(rx))
    }
}
