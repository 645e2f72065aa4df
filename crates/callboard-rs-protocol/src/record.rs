//! Call record model and lenient decoding of rows returned by the backend.

use crate::RecordId;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A single phone call handled by the voice agent.
///
/// Field names match the columns of the `calls` table so rows serialize
/// one-to-one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallRecord {
    /// Row identifier assigned by the remote store.
    pub id: RecordId,
    /// Correlation id of the underlying voice call.
    #[serde(default)]
    pub call_id: String,
    /// Agent that handled the call, if known.
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Free-form status label such as `completed`.
    #[serde(default)]
    pub status: String,
    /// Call length in seconds.
    #[serde(default)]
    pub duration: u64,
    /// Conversation transcript.
    #[serde(default)]
    pub transcript: Option<String>,
    /// Link to the hosted audio recording.
    #[serde(default)]
    pub recording_url: Option<String>,
    /// Operator marked the call as positive.
    #[serde(default)]
    pub love_the_call: bool,
    /// Caller asked for a follow-up meeting.
    #[serde(default)]
    pub meeting_requested: bool,
    /// Opaque integration payload.
    #[serde(default)]
    pub metadata: Option<Value>,
    /// Creation time; the ordering key of every view.
    pub created_at: DateTime<Utc>,
}

/// Reasons a backend row cannot become a [`CallRecord`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordDecodeError {
    /// The row is not a JSON object.
    #[error("row is not an object")]
    NotAnObject,
    /// A required column is absent or null.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    /// A column holds a value of the wrong shape.
    #[error("invalid value for {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
}

impl CallRecord {
    /// Decode a backend row, defaulting every optional column.
    ///
    /// Only `id` and `created_at` are required. Missing, null or negative
    /// durations become `0`; missing flags become `false`.
    pub fn from_row(row: &Value) -> Result<Self, RecordDecodeError> {
        let map = row.as_object().ok_or(RecordDecodeError::NotAnObject)?;
        let id = match map.get("id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            Some(Value::Null) | None => return Err(RecordDecodeError::MissingField("id")),
            Some(other) => {
                return Err(RecordDecodeError::InvalidField {
                    field: "id",
                    message: format!("unexpected value {other}"),
                });
            }
        };
        let created_at = match map.get("created_at") {
            Some(Value::String(raw)) => {
                parse_timestamp(raw).ok_or_else(|| RecordDecodeError::InvalidField {
                    field: "created_at",
                    message: format!("unparseable timestamp {raw:?}"),
                })?
            }
            Some(Value::Null) | None => {
                return Err(RecordDecodeError::MissingField("created_at"));
            }
            Some(other) => {
                return Err(RecordDecodeError::InvalidField {
                    field: "created_at",
                    message: format!("unexpected value {other}"),
                });
            }
        };

        Ok(Self {
            id,
            call_id: string_field(map, "call_id").unwrap_or_default(),
            agent_id: string_field(map, "agent_id"),
            status: string_field(map, "status").unwrap_or_default(),
            duration: duration_field(map.get("duration")),
            transcript: string_field(map, "transcript"),
            recording_url: string_field(map, "recording_url"),
            love_the_call: bool_field(map, "love_the_call"),
            meeting_requested: bool_field(map, "meeting_requested"),
            metadata: map.get("metadata").filter(|value| !value.is_null()).cloned(),
            created_at,
        })
    }

    /// True when the call counts as a lead (positive or meeting requested).
    pub fn is_lead(&self) -> bool {
        self.love_the_call || self.meeting_requested
    }
}

/// Parse the timestamp formats the backend emits.
///
/// Accepts RFC 3339, naive `YYYY-MM-DD HH:MM:SS[.f]` (assumed UTC) and bare
/// dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts.and_utc());
        }
    }
    // Postgres renders offsets as `+00`, which RFC 3339 rejects.
    if let Ok(ts) = DateTime::parse_from_str(&format!("{raw}00"), "%Y-%m-%d %H:%M:%S%.f%z") {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(value)) => Some(value.clone()),
        Some(Value::Number(value)) => Some(value.to_string()),
        _ => None,
    }
}

fn bool_field(map: &Map<String, Value>, key: &str) -> bool {
    matches!(map.get(key), Some(Value::Bool(true)))
}

fn duration_field(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| number.as_f64().and_then(whole_seconds))
            .unwrap_or(0),
        Some(Value::String(raw)) => {
            let raw = raw.trim();
            raw.parse::<u64>()
                .ok()
                .or_else(|| whole_seconds(raw.parse::<f64>().ok()?))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

/// Truncate fractional seconds; negative and non-finite values are absent.
fn whole_seconds(secs: f64) -> Option<u64> {
    (secs.is_finite() && secs > 0.0).then(|| secs as u64)
}
