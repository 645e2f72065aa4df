//! Wire types shared by the Callboard crates: call records and the change
//! notifications delivered by the realtime feed.

mod change;
mod record;

pub use change::{ChangeEvent, ChangeKind};
pub use record::{CallRecord, RecordDecodeError, parse_timestamp};

/// Identifier assigned to a call record by the remote store.
pub type RecordId = String;
