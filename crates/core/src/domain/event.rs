use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::approval::ApprovalDecision;
use crate::domain::job::{JobId, JobState};
use crate::domain::principal::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobEventId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobEventType {
    StateChange,
    Note,
    ApprovalSent,
    ApprovalDecided,
}

impl JobEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobEventType::StateChange => "STATE_CHANGE",
            JobEventType::Note => "NOTE",
            JobEventType::ApprovalSent => "APPROVAL_SENT",
            JobEventType::ApprovalDecided => "APPROVAL_DECIDED",
        }
    }
}

/// Per-event-type payload. Each variant carries its own fixed schema; the
/// serialized form is tagged so stored history decodes back into the variant
/// it was written as.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    StateChange {
        from_state: Option<JobState>,
        to_state: JobState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Note {
        text: String,
    },
    ApprovalSent {
        url: String,
    },
    ApprovalDecided {
        decision: ApprovalDecision,
    },
}

impl EventPayload {
    pub fn event_type(&self) -> JobEventType {
        match self {
            EventPayload::StateChange { .. } => JobEventType::StateChange,
            EventPayload::Note { .. } => JobEventType::Note,
            EventPayload::ApprovalSent { .. } => JobEventType::ApprovalSent,
            EventPayload::ApprovalDecided { .. } => JobEventType::ApprovalDecided,
        }
    }
}

/// An immutable fact appended to a job's history.
///
/// Events are written in the same atomic unit as the change they document and
/// are never updated or deleted. Canonical ordering is `(created_at, seq)`
/// where `seq` is the storage insertion counter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    pub id: JobEventId,
    pub job_id: JobId,
    pub seq: i64,
    pub payload: EventPayload,
    /// Absent for customer-originated events (approval decisions).
    pub actor_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}
