//! Transition policy for the repair-job workflow.
//!
//! Pure edge tables plus role gates; no state, no I/O. The lifecycle manager
//! and the approval workflow both consult this module before mutating
//! anything.

use crate::domain::job::{Job, JobState};
use crate::domain::principal::{Principal, Role};

/// Legal forward edges: the canonical path with one branch at `InRepair`.
pub fn forward_targets(from: JobState) -> &'static [JobState] {
    match from {
        JobState::CheckedIn => &[JobState::Diagnosis],
        JobState::Diagnosis => &[JobState::WaitingApproval],
        JobState::WaitingApproval => &[JobState::ApprovedReady],
        JobState::ApprovedReady => &[JobState::InRepair],
        JobState::InRepair => &[JobState::WaitingParts, JobState::QualityCheck],
        JobState::WaitingParts => &[JobState::InRepair],
        JobState::QualityCheck => &[JobState::ReadyPickup],
        JobState::ReadyPickup => &[JobState::Closed],
        JobState::Closed => &[],
    }
}

/// Back edges move a job to an earlier stage; each one requires a non-empty
/// justification recorded in the audit trail.
pub fn back_targets(from: JobState) -> &'static [JobState] {
    match from {
        JobState::WaitingApproval => &[JobState::Diagnosis],
        JobState::InRepair => &[JobState::Diagnosis],
        JobState::QualityCheck => &[JobState::InRepair],
        _ => &[],
    }
}

pub fn can_transition(from: JobState, to: JobState) -> bool {
    forward_targets(from).contains(&to) || back_targets(from).contains(&to)
}

pub fn requires_reason(from: JobState, to: JobState) -> bool {
    back_targets(from).contains(&to)
}

/// Owners and advisors manage jobs; techs only work the jobs assigned to
/// them.
pub fn can_manage_jobs(role: Role) -> bool {
    matches!(role, Role::Owner | Role::Advisor)
}

/// Actor-level gate for transitions and notes. Tenant mismatch is checked
/// upstream and reported as NotFound; this only answers the role question.
pub fn can_act_on_job(principal: &Principal, job: &Job) -> bool {
    if can_manage_jobs(principal.role) {
        return true;
    }
    job.assigned_tech_id.as_ref() == Some(&principal.id)
}

/// Tech-board buckets: states an assigned tech can actively work on.
pub const TECH_STATES_DO_NOW: [JobState; 2] = [JobState::ApprovedReady, JobState::InRepair];

/// States where the tech is blocked on something external.
pub const TECH_STATES_BLOCKED: [JobState; 2] = [JobState::WaitingParts, JobState::WaitingApproval];
