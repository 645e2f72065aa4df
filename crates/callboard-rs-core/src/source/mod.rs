//! Remote record sources: bulk reads plus a push feed of changes.

mod realtime;
mod rest;

pub use realtime::{RealtimeFrame, decode_frame, realtime_url};
pub use rest::{SupabaseSource, decode_rows};

use crate::error::SourceError;
use async_trait::async_trait;
use callboard_rs_protocol::{CallRecord, ChangeEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Item delivered by a [`ChangeStream`]. An `Err` ends the stream.
pub type FeedItem = Result<ChangeEvent, SourceError>;

/// Read and subscribe capabilities of the remote store.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch every record, newest first.
    async fn fetch_all(&self) -> Result<Vec<CallRecord>, SourceError>;

    /// Open a push subscription to changes of the collection.
    async fn subscribe(&self) -> Result<ChangeStream, SourceError>;
}

/// Live change notifications. Dropping the stream releases the subscription.
pub struct ChangeStream {
    receiver: mpsc::Receiver<FeedItem>,
    pump: Option<JoinHandle<()>>,
}

impl ChangeStream {
    /// Wrap a receiver fed by a background pump task that is aborted on drop.
    pub fn new(receiver: mpsc::Receiver<FeedItem>, pump: JoinHandle<()>) -> Self {
        Self {
            receiver,
            pump: Some(pump),
        }
    }

    /// Wrap a receiver whose sender is owned elsewhere.
    pub fn from_receiver(receiver: mpsc::Receiver<FeedItem>) -> Self {
        Self {
            receiver,
            pump: None,
        }
    }

    /// Next change; `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<FeedItem> {
        self.receiver.recv().await
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}
