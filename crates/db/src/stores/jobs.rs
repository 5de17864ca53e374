use async_trait::async_trait;

use shopfloor_core::domain::event::{EventPayload, JobEvent, JobEventId};
use shopfloor_core::domain::job::{Job, JobId, JobState, NewJob};
use shopfloor_core::domain::principal::{Principal, ShopId, UserId};
use shopfloor_core::errors::{EngineError, EngineResult};
use shopfloor_core::policy;

use super::{
    decode_event_row, decode_job_row, is_unique_violation, map_sqlx, new_id, now_string,
    parse_timestamp, JobWorkflow,
};
use crate::DbPool;

/// First human-facing number handed out per shop.
const FIRST_JOB_NUMBER: i64 = 1001;

/// Bounded retries for the job-number allocation race before giving up.
const CREATE_RETRIES: u32 = 3;

pub struct SqlJobStore {
    pool: DbPool,
}

impl SqlJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// One creation attempt in one transaction. Loses the numbering race as a
    /// `Conflict`, which the caller retries.
    async fn try_create(&self, actor: &Principal, input: &NewJob) -> EngineResult<Job> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        ensure_active_tech(&mut *tx, &actor.shop_id, &input.assigned_tech_id).await?;

        let job_number: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(job_number) + 1, ?) FROM job WHERE shop_id = ?")
                .bind(FIRST_JOB_NUMBER)
                .bind(&actor.shop_id.0)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_sqlx)?;

        let now = now_string();
        let customer_id = new_id("cust");
        sqlx::query("INSERT INTO customer (id, shop_id, name, created_at) VALUES (?, ?, ?, ?)")
            .bind(&customer_id)
            .bind(&actor.shop_id.0)
            .bind(input.customer_name.trim())
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        let vehicle_id = new_id("veh");
        sqlx::query(
            "INSERT INTO vehicle (id, shop_id, customer_id, year, make, model, trim, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&vehicle_id)
        .bind(&actor.shop_id.0)
        .bind(&customer_id)
        .bind(input.vehicle_year)
        .bind(input.vehicle_make.as_deref())
        .bind(input.vehicle_model.as_deref())
        .bind(input.vehicle_trim.as_deref())
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        let job_id = JobId(new_id("job"));
        let insert = sqlx::query(
            "INSERT INTO job (id, shop_id, job_number, customer_id, vehicle_id, title, status,
                              priority, assigned_tech_id, created_at, closed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL)",
        )
        .bind(&job_id.0)
        .bind(&actor.shop_id.0)
        .bind(job_number)
        .bind(&customer_id)
        .bind(&vehicle_id)
        .bind(input.title.trim())
        .bind(JobState::CheckedIn.as_str())
        .bind(input.priority.as_str())
        .bind(&input.assigned_tech_id)
        .bind(&now)
        .execute(&mut *tx)
        .await;

        if let Err(err) = insert {
            if is_unique_violation(&err) {
                return Err(EngineError::Conflict(format!(
                    "job number {job_number} was taken by a concurrent creation"
                )));
            }
            return Err(map_sqlx(err));
        }

        let payload = EventPayload::StateChange {
            from_state: None,
            to_state: JobState::CheckedIn,
            reason: None,
        };
        append_event(&mut *tx, &job_id, &payload, Some(&actor.id)).await?;

        tx.commit().await.map_err(map_sqlx)?;

        Ok(Job {
            id: job_id,
            shop_id: actor.shop_id.clone(),
            job_number,
            customer_id: shopfloor_core::domain::customer::CustomerId(customer_id),
            vehicle_id: shopfloor_core::domain::customer::VehicleId(vehicle_id),
            title: input.title.trim().to_string(),
            state: JobState::CheckedIn,
            priority: input.priority,
            assigned_tech_id: Some(UserId(input.assigned_tech_id.clone())),
            created_at: parse_timestamp(&now)?,
            closed_at: None,
        })
    }
}

#[async_trait]
impl JobWorkflow for SqlJobStore {
    async fn create_job(&self, actor: &Principal, input: NewJob) -> EngineResult<Job> {
        if !policy::can_manage_jobs(actor.role) {
            return Err(EngineError::Forbidden);
        }
        if input.title.trim().is_empty() {
            return Err(EngineError::Validation("title must not be empty".to_string()));
        }
        if input.customer_name.trim().is_empty() {
            return Err(EngineError::Validation("customer_name must not be empty".to_string()));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_create(actor, &input).await {
                Err(EngineError::Conflict(_)) if attempt < CREATE_RETRIES => continue,
                result => return result,
            }
        }
    }

    async fn get_job(&self, actor: &Principal, job_id: &JobId) -> EngineResult<Job> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx)?;
        load_job(&mut *conn, job_id, &actor.shop_id).await
    }

    async fn list_jobs(&self, actor: &Principal) -> EngineResult<Vec<Job>> {
        let rows = sqlx::query("SELECT * FROM job WHERE shop_id = ? ORDER BY job_number")
            .bind(&actor.shop_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(decode_job_row).collect()
    }

    async fn transition_job(
        &self,
        actor: &Principal,
        job_id: &JobId,
        to_state: JobState,
        reason: Option<String>,
    ) -> EngineResult<Job> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let mut job = load_job(&mut *tx, job_id, &actor.shop_id).await?;
        if !policy::can_act_on_job(actor, &job) {
            return Err(EngineError::Forbidden);
        }
        if !policy::can_transition(job.state, to_state) {
            return Err(EngineError::InvalidTransition { from: job.state, to: to_state });
        }
        let has_reason = reason.as_deref().is_some_and(|text| !text.trim().is_empty());
        if policy::requires_reason(job.state, to_state) && !has_reason {
            return Err(EngineError::ReasonRequired { from: job.state, to: to_state });
        }

        let closed_at = (to_state == JobState::Closed).then(now_string);
        sqlx::query("UPDATE job SET status = ?, closed_at = ? WHERE id = ?")
            .bind(to_state.as_str())
            .bind(closed_at.as_deref())
            .bind(&job.id.0)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        let payload = EventPayload::StateChange {
            from_state: Some(job.state),
            to_state,
            reason: reason.filter(|_| has_reason),
        };
        append_event(&mut *tx, &job.id, &payload, Some(&actor.id)).await?;

        tx.commit().await.map_err(map_sqlx)?;

        job.state = to_state;
        job.closed_at = closed_at.as_deref().map(parse_timestamp).transpose()?;
        Ok(job)
    }

    async fn assign_tech(
        &self,
        actor: &Principal,
        job_id: &JobId,
        tech_id: &UserId,
    ) -> EngineResult<Job> {
        if !policy::can_manage_jobs(actor.role) {
            return Err(EngineError::Forbidden);
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let mut job = load_job(&mut *tx, job_id, &actor.shop_id).await?;
        ensure_active_tech(&mut *tx, &actor.shop_id, &tech_id.0).await?;

        // Assignment is deliberately not audited; only lifecycle facts land in
        // the event log.
        sqlx::query("UPDATE job SET assigned_tech_id = ? WHERE id = ?")
            .bind(&tech_id.0)
            .bind(&job.id.0)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        tx.commit().await.map_err(map_sqlx)?;

        job.assigned_tech_id = Some(tech_id.clone());
        Ok(job)
    }

    async fn add_note(
        &self,
        actor: &Principal,
        job_id: &JobId,
        text: &str,
    ) -> EngineResult<JobEvent> {
        if text.trim().is_empty() {
            return Err(EngineError::Validation("note text must not be empty".to_string()));
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let job = load_job(&mut *tx, job_id, &actor.shop_id).await?;
        if !policy::can_act_on_job(actor, &job) {
            return Err(EngineError::Forbidden);
        }

        let payload = EventPayload::Note { text: text.to_string() };
        let event = append_event(&mut *tx, &job.id, &payload, Some(&actor.id)).await?;
        tx.commit().await.map_err(map_sqlx)?;
        Ok(event)
    }

    async fn list_events(&self, actor: &Principal, job_id: &JobId) -> EngineResult<Vec<JobEvent>> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx)?;
        let job = load_job(&mut *conn, job_id, &actor.shop_id).await?;

        let rows =
            sqlx::query("SELECT * FROM job_event WHERE job_id = ? ORDER BY created_at, seq")
                .bind(&job.id.0)
                .fetch_all(&mut *conn)
                .await
                .map_err(map_sqlx)?;
        rows.iter().map(decode_event_row).collect()
    }
}

/// Tenant-scoped job fetch. A job in another shop and a missing job are the
/// same `NotFound` to the caller.
pub(crate) async fn load_job(
    conn: &mut sqlx::SqliteConnection,
    job_id: &JobId,
    shop_id: &ShopId,
) -> EngineResult<Job> {
    let row = sqlx::query("SELECT * FROM job WHERE id = ?")
        .bind(&job_id.0)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx)?;

    let Some(row) = row else {
        return Err(EngineError::NotFound);
    };
    let job = decode_job_row(&row)?;
    if job.shop_id != *shop_id {
        return Err(EngineError::NotFound);
    }
    Ok(job)
}

/// Append one immutable fact to the job's history. Callers own the
/// transaction so the event always lands with the change it documents.
pub(crate) async fn append_event(
    conn: &mut sqlx::SqliteConnection,
    job_id: &JobId,
    payload: &EventPayload,
    actor_id: Option<&UserId>,
) -> EngineResult<JobEvent> {
    let id = new_id("evt");
    let created_at = now_string();
    let payload_json = serde_json::to_string(payload)
        .map_err(|err| EngineError::Persistence(format!("event payload encode: {err}")))?;

    let result = sqlx::query(
        "INSERT INTO job_event (id, job_id, event_type, payload, actor_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&job_id.0)
    .bind(payload.event_type().as_str())
    .bind(&payload_json)
    .bind(actor_id.map(|actor| actor.0.clone()))
    .bind(&created_at)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx)?;

    Ok(JobEvent {
        id: JobEventId(id),
        job_id: job_id.clone(),
        seq: result.last_insert_rowid(),
        payload: payload.clone(),
        actor_id: actor_id.cloned(),
        created_at: parse_timestamp(&created_at)?,
    })
}

pub(crate) async fn ensure_active_tech(
    conn: &mut sqlx::SqliteConnection,
    shop_id: &ShopId,
    tech_id: &str,
) -> EngineResult<()> {
    let found = sqlx::query(
        "SELECT id FROM shop_user WHERE id = ? AND shop_id = ? AND role = 'TECH' AND active = 1",
    )
    .bind(tech_id)
    .bind(&shop_id.0)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_sqlx)?;

    if found.is_none() {
        return Err(EngineError::Validation(
            "assigned_tech_id must be an active technician of this shop".to_string(),
        ));
    }
    Ok(())
}
