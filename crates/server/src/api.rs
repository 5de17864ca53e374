//! Staff-facing JSON API.
//!
//! Endpoints (all under `/api/v1`, all requiring the identity headers):
//! - `POST /api/v1/jobs`                        — check a vehicle in
//! - `GET  /api/v1/jobs`                        — list the shop's jobs
//! - `GET  /api/v1/jobs/{id}`                   — fetch one job
//! - `GET  /api/v1/jobs/{id}/events`            — full audit trail, oldest first
//! - `POST /api/v1/jobs/{id}/transition`        — move the job through the workflow
//! - `POST /api/v1/jobs/{id}/assign`            — reassign the technician
//! - `POST /api/v1/jobs/{id}/notes`             — append a free-text note event
//! - `POST /api/v1/jobs/{id}/line-items`        — propose work on the estimate
//! - `GET  /api/v1/jobs/{id}/line-items`        — list the estimate
//! - `POST /api/v1/jobs/{id}/media`             — attach an inspection photo/video
//! - `GET  /api/v1/jobs/{id}/media`             — list attached media
//! - `POST /api/v1/jobs/{id}/approval-request`  — issue the customer approval link
//! - `GET  /api/v1/board`                       — open jobs bucketed for the shop floor

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use shopfloor_core::domain::event::JobEvent;
use shopfloor_core::domain::job::{Job, JobId, JobPriority, JobState, NewJob};
use shopfloor_core::domain::line_item::{LineItem, NewLineItem};
use shopfloor_core::domain::media::{InspectionMedia, NewMedia};
use shopfloor_core::domain::principal::{Role, UserId};
use shopfloor_core::errors::EngineError;
use shopfloor_core::policy;
use shopfloor_db::stores::{
    ApprovalWorkflow, JobWorkflow, LineItemLedger, MediaLog, SqlApprovalStore, SqlJobStore,
    SqlLineItemStore, SqlMediaStore,
};
use shopfloor_db::DbPool;

use crate::auth::AuthPrincipal;

#[derive(Clone)]
pub struct ApiState {
    pub jobs: Arc<SqlJobStore>,
    pub approvals: Arc<SqlApprovalStore>,
    pub line_items: Arc<SqlLineItemStore>,
    pub media: Arc<SqlMediaStore>,
}

impl ApiState {
    pub fn new(db_pool: DbPool, secret: SecretString, public_base_url: impl Into<String>) -> Self {
        Self {
            jobs: Arc::new(SqlJobStore::new(db_pool.clone())),
            approvals: Arc::new(SqlApprovalStore::new(db_pool.clone(), secret, public_base_url)),
            line_items: Arc::new(SqlLineItemStore::new(db_pool.clone())),
            media: Arc::new(SqlMediaStore::new(db_pool)),
        }
    }
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub to_state: JobState,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub tech_id: String,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ApprovalLinkResponse {
    pub approval_url: String,
}

/// One card on the shop-floor board.
#[derive(Debug, Serialize)]
pub struct BoardEntry {
    pub id: JobId,
    pub job_number: i64,
    pub title: String,
    pub state: JobState,
    pub state_label: &'static str,
    pub priority: JobPriority,
    pub priority_label: &'static str,
}

impl From<Job> for BoardEntry {
    fn from(job: Job) -> Self {
        Self {
            state_label: job.state.label(),
            priority_label: job.priority.label(),
            id: job.id,
            job_number: job.job_number,
            title: job.title,
            state: job.state,
            priority: job.priority,
        }
    }
}

/// Open jobs split into what a technician can pick up now, what is blocked on
/// parts or the customer, and everything still moving through other hands.
#[derive(Debug, Default, Serialize)]
pub struct BoardResponse {
    pub do_now: Vec<BoardEntry>,
    pub blocked: Vec<BoardEntry>,
    pub elsewhere: Vec<BoardEntry>,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

/// `EngineError` carried across the HTTP boundary. Response bodies use the
/// sanitized user message; the precise variant only picks the status code.
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::NotFound => StatusCode::NOT_FOUND,
            EngineError::Forbidden => StatusCode::FORBIDDEN,
            EngineError::InvalidTransition { .. }
            | EngineError::ReasonRequired { .. }
            | EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(event_name = "api.request.failed", error = %self.0, "request failed");
        }
        (status, Json(ApiErrorBody { error: self.0.user_message().to_string() })).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/jobs", post(create_job).get(list_jobs))
        .route("/api/v1/jobs/{id}", get(get_job))
        .route("/api/v1/jobs/{id}/events", get(list_events))
        .route("/api/v1/jobs/{id}/transition", post(transition_job))
        .route("/api/v1/jobs/{id}/assign", post(assign_tech))
        .route("/api/v1/jobs/{id}/notes", post(add_note))
        .route("/api/v1/jobs/{id}/line-items", post(add_line_item).get(list_line_items))
        .route("/api/v1/jobs/{id}/media", post(add_media).get(list_media))
        .route("/api/v1/jobs/{id}/approval-request", post(request_approval))
        .route("/api/v1/board", get(board))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn create_job(
    State(state): State<ApiState>,
    AuthPrincipal(actor): AuthPrincipal,
    Json(body): Json<NewJob>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let job = state.jobs.create_job(&actor, body).await?;
    info!(
        event_name = "api.job.created",
        job_id = %job.id.0,
        job_number = job.job_number,
        shop_id = %job.shop_id.0,
        "job checked in"
    );
    Ok((StatusCode::CREATED, Json(job)))
}

async fn list_jobs(
    State(state): State<ApiState>,
    AuthPrincipal(actor): AuthPrincipal,
) -> Result<Json<Vec<Job>>, ApiError> {
    Ok(Json(state.jobs.list_jobs(&actor).await?))
}

async fn get_job(
    State(state): State<ApiState>,
    AuthPrincipal(actor): AuthPrincipal,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.jobs.get_job(&actor, &JobId(id)).await?))
}

async fn list_events(
    State(state): State<ApiState>,
    AuthPrincipal(actor): AuthPrincipal,
    Path(id): Path<String>,
) -> Result<Json<Vec<JobEvent>>, ApiError> {
    Ok(Json(state.jobs.list_events(&actor, &JobId(id)).await?))
}

async fn transition_job(
    State(state): State<ApiState>,
    AuthPrincipal(actor): AuthPrincipal,
    Path(id): Path<String>,
    Json(body): Json<TransitionRequest>,
) -> Result<Json<Job>, ApiError> {
    let job = state.jobs.transition_job(&actor, &JobId(id), body.to_state, body.reason).await?;
    info!(
        event_name = "api.job.transitioned",
        job_id = %job.id.0,
        to_state = job.state.as_str(),
        actor_id = %actor.id.0,
        "job transitioned"
    );
    Ok(Json(job))
}

async fn assign_tech(
    State(state): State<ApiState>,
    AuthPrincipal(actor): AuthPrincipal,
    Path(id): Path<String>,
    Json(body): Json<AssignRequest>,
) -> Result<Json<Job>, ApiError> {
    let job = state.jobs.assign_tech(&actor, &JobId(id), &UserId(body.tech_id)).await?;
    Ok(Json(job))
}

async fn add_note(
    State(state): State<ApiState>,
    AuthPrincipal(actor): AuthPrincipal,
    Path(id): Path<String>,
    Json(body): Json<NoteRequest>,
) -> Result<(StatusCode, Json<JobEvent>), ApiError> {
    let event = state.jobs.add_note(&actor, &JobId(id), &body.text).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn add_line_item(
    State(state): State<ApiState>,
    AuthPrincipal(actor): AuthPrincipal,
    Path(id): Path<String>,
    Json(body): Json<NewLineItem>,
) -> Result<(StatusCode, Json<LineItem>), ApiError> {
    let item = state.line_items.add_line_item(&actor, &JobId(id), body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn list_line_items(
    State(state): State<ApiState>,
    AuthPrincipal(actor): AuthPrincipal,
    Path(id): Path<String>,
) -> Result<Json<Vec<LineItem>>, ApiError> {
    Ok(Json(state.line_items.list_line_items(&actor, &JobId(id)).await?))
}

async fn add_media(
    State(state): State<ApiState>,
    AuthPrincipal(actor): AuthPrincipal,
    Path(id): Path<String>,
    Json(body): Json<NewMedia>,
) -> Result<(StatusCode, Json<InspectionMedia>), ApiError> {
    let media = state.media.add_media(&actor, &JobId(id), body).await?;
    Ok((StatusCode::CREATED, Json(media)))
}

async fn list_media(
    State(state): State<ApiState>,
    AuthPrincipal(actor): AuthPrincipal,
    Path(id): Path<String>,
) -> Result<Json<Vec<InspectionMedia>>, ApiError> {
    Ok(Json(state.media.list_media(&actor, &JobId(id)).await?))
}

async fn board(
    State(state): State<ApiState>,
    AuthPrincipal(actor): AuthPrincipal,
) -> Result<Json<BoardResponse>, ApiError> {
    let jobs = state.jobs.list_jobs(&actor).await?;

    let mut board = BoardResponse::default();
    for job in jobs {
        if job.is_closed() {
            continue;
        }
        // A tech's board carries only their own assignments; managers see the
        // whole floor.
        if actor.role == Role::Tech && job.assigned_tech_id.as_ref() != Some(&actor.id) {
            continue;
        }
        let bucket = if policy::TECH_STATES_DO_NOW.contains(&job.state) {
            &mut board.do_now
        } else if policy::TECH_STATES_BLOCKED.contains(&job.state) {
            &mut board.blocked
        } else {
            &mut board.elsewhere
        };
        bucket.push(BoardEntry::from(job));
    }
    Ok(Json(board))
}

async fn request_approval(
    State(state): State<ApiState>,
    AuthPrincipal(actor): AuthPrincipal,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ApprovalLinkResponse>), ApiError> {
    let job_id = JobId(id);
    let approval_url = state.approvals.request_approval(&actor, &job_id).await?;
    info!(
        event_name = "api.approval.requested",
        job_id = %job_id.0,
        actor_id = %actor.id.0,
        "approval link issued"
    );
    Ok((StatusCode::CREATED, Json(ApprovalLinkResponse { approval_url })))
}
