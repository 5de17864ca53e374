//! Workflow engine stores.
//!
//! Every mutation runs inside one sqlite transaction together with the audit
//! event that documents it. Tenant mismatches and missing rows are both
//! reported as `NotFound` so a caller cannot probe another shop's job ids.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use shopfloor_core::domain::approval::{ApprovalDecision, ApprovalReview};
use shopfloor_core::domain::event::{EventPayload, JobEvent, JobEventId};
use shopfloor_core::domain::job::{Job, JobId, JobPriority, JobState, NewJob};
use shopfloor_core::domain::line_item::{LineItem, LineItemId, NewLineItem};
use shopfloor_core::domain::media::{InspectionMedia, MediaId, NewMedia};
use shopfloor_core::domain::principal::{Principal, UserId};
use shopfloor_core::errors::{EngineError, EngineResult};

pub mod approvals;
pub mod jobs;
pub mod line_items;
pub mod media;

pub use approvals::SqlApprovalStore;
pub use jobs::SqlJobStore;
pub use line_items::SqlLineItemStore;
pub use media::SqlMediaStore;

#[async_trait]
pub trait JobWorkflow: Send + Sync {
    async fn create_job(&self, actor: &Principal, input: NewJob) -> EngineResult<Job>;
    async fn get_job(&self, actor: &Principal, job_id: &JobId) -> EngineResult<Job>;
    async fn list_jobs(&self, actor: &Principal) -> EngineResult<Vec<Job>>;
    async fn transition_job(
        &self,
        actor: &Principal,
        job_id: &JobId,
        to_state: JobState,
        reason: Option<String>,
    ) -> EngineResult<Job>;
    async fn assign_tech(
        &self,
        actor: &Principal,
        job_id: &JobId,
        tech_id: &UserId,
    ) -> EngineResult<Job>;
    async fn add_note(&self, actor: &Principal, job_id: &JobId, text: &str)
        -> EngineResult<JobEvent>;
    async fn list_events(&self, actor: &Principal, job_id: &JobId) -> EngineResult<Vec<JobEvent>>;
}

#[async_trait]
pub trait ApprovalWorkflow: Send + Sync {
    /// Issue (or re-issue) the approval link for a job in DIAGNOSIS.
    /// Returns the capability URL; the raw token is never stored.
    async fn request_approval(&self, actor: &Principal, job_id: &JobId) -> EngineResult<String>;
    /// Portal read path: what the customer sees behind a live, valid link.
    async fn pending_review(&self, job_id: &JobId, token: &str) -> EngineResult<ApprovalReview>;
    /// Record the customer's decision and cascade it to the proposed items.
    async fn decide(
        &self,
        job_id: &JobId,
        token: &str,
        decision: ApprovalDecision,
    ) -> EngineResult<ApprovalReview>;
}

#[async_trait]
pub trait LineItemLedger: Send + Sync {
    async fn add_line_item(
        &self,
        actor: &Principal,
        job_id: &JobId,
        input: NewLineItem,
    ) -> EngineResult<LineItem>;
    async fn list_line_items(&self, actor: &Principal, job_id: &JobId)
        -> EngineResult<Vec<LineItem>>;
}

#[async_trait]
pub trait MediaLog: Send + Sync {
    async fn add_media(
        &self,
        actor: &Principal,
        job_id: &JobId,
        input: NewMedia,
    ) -> EngineResult<InspectionMedia>;
    async fn list_media(
        &self,
        actor: &Principal,
        job_id: &JobId,
    ) -> EngineResult<Vec<InspectionMedia>>;
}

pub(crate) fn map_sqlx(err: sqlx::Error) -> EngineError {
    EngineError::Persistence(err.to_string())
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub(crate) fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

/// Fixed-width RFC3339 so lexicographic ordering in SQLite matches time order.
pub(crate) fn now_string() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> EngineResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| EngineError::Persistence(format!("unreadable timestamp `{raw}`: {err}")))
}

pub(crate) fn decode_job_row(row: &SqliteRow) -> EngineResult<Job> {
    let state: String = try_column(row, "status")?;
    let priority: String = try_column(row, "priority")?;
    let created_at: String = try_column(row, "created_at")?;
    let closed_at: Option<String> = try_column(row, "closed_at")?;

    Ok(Job {
        id: JobId(try_column(row, "id")?),
        shop_id: shopfloor_core::domain::principal::ShopId(try_column(row, "shop_id")?),
        job_number: try_column(row, "job_number")?,
        customer_id: shopfloor_core::domain::customer::CustomerId(try_column(row, "customer_id")?),
        vehicle_id: shopfloor_core::domain::customer::VehicleId(try_column(row, "vehicle_id")?),
        title: try_column(row, "title")?,
        state: state.parse::<JobState>().map_err(EngineError::Persistence)?,
        priority: priority.parse::<JobPriority>().map_err(EngineError::Persistence)?,
        assigned_tech_id: try_column::<Option<String>>(row, "assigned_tech_id")?.map(UserId),
        created_at: parse_timestamp(&created_at)?,
        closed_at: closed_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

pub(crate) fn decode_event_row(row: &SqliteRow) -> EngineResult<JobEvent> {
    let payload_json: String = try_column(row, "payload")?;
    let payload: EventPayload = serde_json::from_str(&payload_json)
        .map_err(|err| EngineError::Persistence(format!("unreadable event payload: {err}")))?;
    let created_at: String = try_column(row, "created_at")?;

    Ok(JobEvent {
        id: JobEventId(try_column(row, "id")?),
        job_id: JobId(try_column(row, "job_id")?),
        seq: try_column(row, "seq")?,
        payload,
        actor_id: try_column::<Option<String>>(row, "actor_id")?.map(UserId),
        created_at: parse_timestamp(&created_at)?,
    })
}

pub(crate) fn decode_line_item_row(row: &SqliteRow) -> EngineResult<LineItem> {
    let item_type: String = try_column(row, "item_type")?;
    let status: String = try_column(row, "status")?;
    let taxable: i64 = try_column(row, "taxable")?;

    Ok(LineItem {
        id: LineItemId(try_column(row, "id")?),
        job_id: JobId(try_column(row, "job_id")?),
        item_type: item_type.parse().map_err(EngineError::Persistence)?,
        name: try_column(row, "name")?,
        qty: try_column(row, "qty")?,
        unit_price_cents: try_column(row, "unit_price_cents")?,
        labor_hours: try_column(row, "labor_hours")?,
        taxable: taxable != 0,
        status: status.parse().map_err(EngineError::Persistence)?,
        sort_order: try_column(row, "sort_order")?,
    })
}

pub(crate) fn decode_media_row(row: &SqliteRow) -> EngineResult<InspectionMedia> {
    let media_type: String = try_column(row, "media_type")?;
    let created_at: String = try_column(row, "created_at")?;

    Ok(InspectionMedia {
        id: MediaId(try_column(row, "id")?),
        job_id: JobId(try_column(row, "job_id")?),
        media_type: media_type.parse().map_err(EngineError::Persistence)?,
        url: try_column(row, "url")?,
        caption: try_column(row, "caption")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn try_column<'r, T>(row: &'r SqliteRow, name: &str) -> EngineResult<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|err| EngineError::Persistence(format!("column `{name}`: {err}")))
}
