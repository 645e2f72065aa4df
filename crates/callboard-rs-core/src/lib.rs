//! Record synchronization and projections for the call dashboard.
//!
//! This crate owns the ordered record store, the sync controller that keeps
//! it consistent with a remote source, and the pure stats/view derivations
//! consumed by the presentation layer.

pub mod error;
pub mod source;
pub mod stats;
pub mod store;
pub mod sync;
pub mod view;

pub use error::{SourceError, SyncError};
/// Remote sources and their change feeds.
pub use source::{ChangeStream, FeedItem, RecordSource, SupabaseSource};
pub use stats::{Stats, compute_stats};
pub use store::{RecordStore, StoreObserver, UpsertOutcome};
/// Controller facade and its observable status.
pub use sync::{FailureKind, SyncController, SyncFailure, SyncStatus};
pub use view::{DashboardView, HOME_LIMIT, Route, filter_for};
