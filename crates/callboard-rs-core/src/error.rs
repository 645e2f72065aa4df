//! Error types for the sync core.

use thiserror::Error;

/// Errors raised while talking to the remote record source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source settings are unusable.
    #[error("invalid source config: {0}")]
    Config(String),
    /// Transport-level HTTP failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    /// Websocket transport failure.
    #[error("websocket error: {0}")]
    Websocket(#[from] tokio_tungstenite::tungstenite::Error),
    /// A payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    /// The backend refused the change subscription.
    #[error("subscription rejected: {0}")]
    Rejected(String),
    /// The change feed ended.
    #[error("change feed closed: {0}")]
    Closed(String),
    /// The source cannot serve the request right now.
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by [`crate::SyncController`] operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The controller's worker task is gone.
    #[error("sync worker stopped")]
    WorkerStopped,
    /// Opening the change subscription failed.
    #[error("subscription failed: {0}")]
    Subscription(#[from] SourceError),
}
