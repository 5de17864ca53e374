use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::JobId;
use crate::domain::line_item::{LineItem, LineItemStatus};
use crate::domain::media::InspectionMedia;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Sent,
    Approved,
    Declined,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Sent => "SENT",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Declined => "DECLINED",
        }
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "SENT" => Ok(ApprovalStatus::Sent),
            "APPROVED" => Ok(ApprovalStatus::Approved),
            "DECLINED" => Ok(ApprovalStatus::Declined),
            other => Err(format!("unknown approval status `{other}`")),
        }
    }
}

/// The customer's one-shot choice over all currently proposed line items.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalDecision {
    Approve,
    Decline,
}

impl ApprovalDecision {
    /// Status applied to every PROPOSED line item by the cascade.
    pub fn line_item_status(&self) -> LineItemStatus {
        match self {
            ApprovalDecision::Approve => LineItemStatus::Approved,
            ApprovalDecision::Decline => LineItemStatus::Declined,
        }
    }

    pub fn terminal_status(&self) -> ApprovalStatus {
        match self {
            ApprovalDecision::Approve => ApprovalStatus::Approved,
            ApprovalDecision::Decline => ApprovalStatus::Declined,
        }
    }
}

impl std::str::FromStr for ApprovalDecision {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "approve" => Ok(ApprovalDecision::Approve),
            "decline" => Ok(ApprovalDecision::Decline),
            other => Err(format!("unknown approval decision `{other}`")),
        }
    }
}

/// 1:1 companion to a job for one approval cycle.
///
/// Only a keyed hash of the customer token is ever stored. At most one live
/// (`status = Sent`, `decided_at = None`) request exists per job; re-issuing
/// replaces the hash and clears `decided_at`, invalidating the earlier link.
/// Once `decided_at` is set the record is terminal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub job_id: JobId,
    pub status: ApprovalStatus,
    pub customer_token_hash: String,
    pub sent_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl ApprovalRequest {
    pub fn is_live(&self) -> bool {
        self.status == ApprovalStatus::Sent && self.decided_at.is_none()
    }
}

/// What the customer sees behind a valid capability URL: the pending items
/// and their flat total, plus enough context to recognize the job.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ApprovalReview {
    pub job_id: JobId,
    pub shop_name: String,
    pub job_title: String,
    pub vehicle_summary: String,
    pub line_items: Vec<LineItem>,
    pub media: Vec<InspectionMedia>,
    pub total_cents: i64,
}
