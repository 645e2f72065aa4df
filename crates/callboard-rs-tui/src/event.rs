//! TUI event types for input and sync notifications.

use callboard_rs_core::SyncStatus;
use callboard_rs_protocol::CallRecord;
use crossterm::event::KeyEvent;

/// Application event emitted by input handlers or the sync controller.
#[derive(Debug)]
pub enum AppEvent {
    /// Keyboard input event.
    Input(KeyEvent),
    /// Periodic tick event.
    Tick,
    /// New store snapshot.
    Records(Vec<CallRecord>),
    /// Controller status change.
    Status(SyncStatus),
}
