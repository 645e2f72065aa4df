//! Change notifications pushed by the realtime feed.

use crate::{CallRecord, RecordId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of row change reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    /// Parse the uppercase kind label used on the wire.
    pub fn parse(label: &str) -> Option<Self> {
        match label.to_ascii_uppercase().as_str() {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(label)
    }
}

/// A single change to the mirrored collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "payload")]
pub enum ChangeEvent {
    /// A row was created.
    Insert(CallRecord),
    /// An existing row changed.
    Update(CallRecord),
    /// A row was removed; only its id is known.
    Delete { id: RecordId },
}

impl ChangeEvent {
    /// Kind of this change.
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Insert(_) => ChangeKind::Insert,
            Self::Update(_) => ChangeKind::Update,
            Self::Delete { .. } => ChangeKind::Delete,
        }
    }

    /// Id of the affected row.
    pub fn record_id(&self) -> &str {
        match self {
            Self::Insert(record) | Self::Update(record) => &record.id,
            Self::Delete { id } => id,
        }
    }
}
