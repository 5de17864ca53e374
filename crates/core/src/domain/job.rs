use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::customer::{CustomerId, VehicleId};
use crate::domain::principal::{ShopId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

/// Workflow states a repair job moves through. `Closed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    CheckedIn,
    Diagnosis,
    WaitingApproval,
    ApprovedReady,
    InRepair,
    WaitingParts,
    QualityCheck,
    ReadyPickup,
    Closed,
}

impl JobState {
    pub const ALL: [JobState; 9] = [
        JobState::CheckedIn,
        JobState::Diagnosis,
        JobState::WaitingApproval,
        JobState::ApprovedReady,
        JobState::InRepair,
        JobState::WaitingParts,
        JobState::QualityCheck,
        JobState::ReadyPickup,
        JobState::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::CheckedIn => "CHECKED_IN",
            JobState::Diagnosis => "DIAGNOSIS",
            JobState::WaitingApproval => "WAITING_APPROVAL",
            JobState::ApprovedReady => "APPROVED_READY",
            JobState::InRepair => "IN_REPAIR",
            JobState::WaitingParts => "WAITING_PARTS",
            JobState::QualityCheck => "QUALITY_CHECK",
            JobState::ReadyPickup => "READY_PICKUP",
            JobState::Closed => "CLOSED",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobState::CheckedIn => "Checked In",
            JobState::Diagnosis => "Diagnosis",
            JobState::WaitingApproval => "Waiting Approval",
            JobState::ApprovedReady => "Approved / Ready",
            JobState::InRepair => "In Repair",
            JobState::WaitingParts => "Waiting Parts",
            JobState::QualityCheck => "Quality Check",
            JobState::ReadyPickup => "Ready for Pickup",
            JobState::Closed => "Closed",
        }
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        JobState::ALL
            .into_iter()
            .find(|state| state.as_str() == value)
            .ok_or_else(|| format!("unknown job state `{value}`"))
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPriority {
    Low,
    Normal,
    High,
}

impl JobPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPriority::Low => "LOW",
            JobPriority::Normal => "NORMAL",
            JobPriority::High => "HIGH",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobPriority::Low => "Low",
            JobPriority::Normal => "Normal",
            JobPriority::High => "High",
        }
    }
}

impl std::str::FromStr for JobPriority {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "LOW" => Ok(JobPriority::Low),
            "NORMAL" => Ok(JobPriority::Normal),
            "HIGH" => Ok(JobPriority::High),
            other => Err(format!("unknown job priority `{other}`")),
        }
    }
}

/// One repair engagement for one vehicle/customer within one shop.
///
/// `job_number` is shop-scoped, strictly increasing, and externally visible.
/// Jobs are never deleted; a closed job keeps its full history for audit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub shop_id: ShopId,
    pub job_number: i64,
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    pub title: String,
    pub state: JobState,
    pub priority: JobPriority,
    pub assigned_tech_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn is_closed(&self) -> bool {
        self.state == JobState::Closed
    }
}

/// Input for job creation. The customer and vehicle records are created in
/// the same atomic unit as the job itself.
#[derive(Clone, Debug, Deserialize)]
pub struct NewJob {
    pub title: String,
    pub customer_name: String,
    pub vehicle_year: Option<i64>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_trim: Option<String>,
    pub priority: JobPriority,
    pub assigned_tech_id: String,
}

#[cfg(test)]
mod tests {
    use super::{JobPriority, JobState};

    #[test]
    fn job_state_round_trips_through_wire_name() {
        for state in JobState::ALL {
            let parsed: JobState = state.as_str().parse().expect("wire name parses");
            assert_eq!(parsed, state);
        }
    }

    #[test]
    fn unknown_state_is_rejected() {
        assert!("TEARDOWN".parse::<JobState>().is_err());
    }

    #[test]
    fn priority_parses_wire_names() {
        assert_eq!("HIGH".parse::<JobPriority>(), Ok(JobPriority::High));
        assert!("URGENT".parse::<JobPriority>().is_err());
    }
}
