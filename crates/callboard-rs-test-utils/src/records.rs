use callboard_rs_protocol::{CallRecord, parse_timestamp};
use serde_json::Value;

/// Start building a completed call with the given id.
pub fn call(id: &str) -> CallBuilder {
    CallBuilder {
        record: CallRecord {
            id: id.to_string(),
            call_id: format!("call-{id}"),
            agent_id: Some("agent-1".to_string()),
            status: "completed".to_string(),
            duration: 0,
            transcript: None,
            recording_url: None,
            love_the_call: false,
            meeting_requested: false,
            metadata: None,
            created_at: parse_timestamp("2024-01-01T00:00:00Z").expect("base timestamp"),
        },
    }
}

#[derive(Debug, Clone)]
pub struct CallBuilder {
    record: CallRecord,
}

impl CallBuilder {
    /// Creation time; accepts any format `parse_timestamp` does.
    pub fn at(mut self, created_at: &str) -> Self {
        self.record.created_at = parse_timestamp(created_at).expect("valid timestamp");
        self
    }

    pub fn duration(mut self, seconds: u64) -> Self {
        self.record.duration = seconds;
        self
    }

    pub fn loved(mut self) -> Self {
        self.record.love_the_call = true;
        self
    }

    pub fn meeting(mut self) -> Self {
        self.record.meeting_requested = true;
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.record.status = status.to_string();
        self
    }

    pub fn transcript(mut self, transcript: &str) -> Self {
        self.record.transcript = Some(transcript.to_string());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.record.metadata = Some(metadata);
        self
    }

    pub fn build(self) -> CallRecord {
        self.record
    }
}

impl From<CallBuilder> for CallRecord {
    fn from(builder: CallBuilder) -> Self {
        builder.build()
    }
}
