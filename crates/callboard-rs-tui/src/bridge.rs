//! Forwards controller notifications into the TUI event loop.

use crate::event::AppEvent;
use callboard_rs_core::{StoreObserver, SyncStatus};
use callboard_rs_protocol::CallRecord;
use log::debug;
use tokio::sync::{mpsc, watch};

/// Store observer that hands snapshots to the event loop.
///
/// The channel is unbounded because observers run under the store lock and
/// must not wait.
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<AppEvent>,
}

impl ChannelObserver {
    pub fn new(sender: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self { sender }
    }
}

impl StoreObserver for ChannelObserver {
    fn records_changed(&self, records: &[CallRecord]) {
        if self.sender.send(AppEvent::Records(records.to_vec())).is_err() {
            debug!("dropping snapshot: event loop closed");
        }
    }
}

/// Spawn a task relaying every status change until either side closes.
pub fn spawn_status_forwarder(
    mut status: watch::Receiver<SyncStatus>,
    sender: mpsc::UnboundedSender<AppEvent>,
) {
    tokio::spawn(async move {
        loop {
            let current = status.borrow_and_update().clone();
            if sender.send(AppEvent::Status(current)).is_err() {
                return;
            }
            if status.changed().await.is_err() {
                return;
            }
        }
    });
}
