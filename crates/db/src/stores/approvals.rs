use async_trait::async_trait;
use secrecy::SecretString;
use sqlx::Row;

use shopfloor_core::domain::approval::{ApprovalDecision, ApprovalRequest, ApprovalReview};
use shopfloor_core::domain::event::EventPayload;
use shopfloor_core::domain::job::{JobId, JobState};
use shopfloor_core::domain::line_item::{LineItem, LineItemStatus};
use shopfloor_core::domain::principal::Principal;
use shopfloor_core::errors::{EngineError, EngineResult};
use shopfloor_core::{policy, token};

use super::jobs::{append_event, load_job};
use super::{
    decode_line_item_row, decode_media_row, map_sqlx, now_string, parse_timestamp, ApprovalWorkflow,
};
use crate::DbPool;

/// Approval workflow over the capability-URL token.
///
/// Everything the customer can trigger is keyed by `(job_id, token)`; every
/// failure mode on that path is the same `NotFound`, so probing a link reveals
/// nothing about whether the job or a request for it exists.
pub struct SqlApprovalStore {
    pool: DbPool,
    secret: SecretString,
    public_base_url: String,
}

impl SqlApprovalStore {
    pub fn new(pool: DbPool, secret: SecretString, public_base_url: impl Into<String>) -> Self {
        Self { pool, secret, public_base_url: public_base_url.into() }
    }

    async fn load_request(
        &self,
        conn: &mut sqlx::SqliteConnection,
        job_id: &JobId,
    ) -> EngineResult<Option<ApprovalRequest>> {
        let row = sqlx::query(
            "SELECT status, customer_token_hash, sent_at, decided_at
             FROM approval_request WHERE job_id = ?",
        )
        .bind(&job_id.0)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx)?;

        row.map(|row| {
            let status: String = row.get("status");
            let sent_at: String = row.get("sent_at");
            let decided_at: Option<String> = row.get("decided_at");
            Ok(ApprovalRequest {
                job_id: job_id.clone(),
                status: status.parse().map_err(EngineError::Persistence)?,
                customer_token_hash: row.get("customer_token_hash"),
                sent_at: parse_timestamp(&sent_at)?,
                decided_at: decided_at.as_deref().map(parse_timestamp).transpose()?,
            })
        })
        .transpose()
    }

    /// Constant-time verification of a presented token against the live
    /// request. Stale, decided, missing, and mismatched all collapse to
    /// `NotFound`.
    fn check_live(&self, request: Option<&ApprovalRequest>, presented: &str) -> EngineResult<()> {
        let Some(request) = request else {
            return Err(EngineError::NotFound);
        };
        if !request.is_live() {
            return Err(EngineError::NotFound);
        }
        if !token::verify_token(&self.secret, presented, &request.customer_token_hash) {
            return Err(EngineError::NotFound);
        }
        Ok(())
    }

    async fn load_review(
        &self,
        job_id: &JobId,
        item_status: LineItemStatus,
    ) -> EngineResult<ApprovalReview> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx)?;

        let header = sqlx::query(
            "SELECT j.title, j.vehicle_id, s.name AS shop_name
             FROM job j JOIN shop s ON s.id = j.shop_id
             WHERE j.id = ?",
        )
        .bind(&job_id.0)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx)?
        .ok_or(EngineError::NotFound)?;

        let vehicle = sqlx::query("SELECT year, make, model, trim FROM vehicle WHERE id = ?")
            .bind(header.get::<String, _>("vehicle_id"))
            .fetch_one(&mut *conn)
            .await
            .map_err(map_sqlx)?;
        let vehicle_summary = summarize_vehicle(
            vehicle.get("year"),
            vehicle.get("make"),
            vehicle.get("model"),
            vehicle.get("trim"),
        );

        let item_rows = sqlx::query(
            "SELECT * FROM line_item WHERE job_id = ? AND status = ? ORDER BY sort_order",
        )
        .bind(&job_id.0)
        .bind(item_status.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(map_sqlx)?;
        let line_items: Vec<LineItem> =
            item_rows.iter().map(decode_line_item_row).collect::<EngineResult<_>>()?;
        let total_cents = line_items.iter().map(LineItem::total_cents).sum();

        let media_rows =
            sqlx::query("SELECT * FROM inspection_media WHERE job_id = ? ORDER BY created_at")
                .bind(&job_id.0)
                .fetch_all(&mut *conn)
                .await
                .map_err(map_sqlx)?;
        let media = media_rows.iter().map(decode_media_row).collect::<EngineResult<_>>()?;

        Ok(ApprovalReview {
            job_id: job_id.clone(),
            shop_name: header.get("shop_name"),
            job_title: header.get("title"),
            vehicle_summary,
            line_items,
            media,
            total_cents,
        })
    }
}

#[async_trait]
impl ApprovalWorkflow for SqlApprovalStore {
    async fn request_approval(&self, actor: &Principal, job_id: &JobId) -> EngineResult<String> {
        if !policy::can_manage_jobs(actor.role) {
            return Err(EngineError::Forbidden);
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let job = load_job(&mut *tx, job_id, &actor.shop_id).await?;
        if job.state != JobState::Diagnosis {
            return Err(EngineError::InvalidTransition {
                from: job.state,
                to: JobState::WaitingApproval,
            });
        }

        let raw_token = token::generate_token();
        let token_hash = token::hash_token(&self.secret, &raw_token);
        // Re-issue replaces the stored hash, invalidating any earlier link.
        sqlx::query(
            "INSERT INTO approval_request (job_id, status, customer_token_hash, sent_at, decided_at)
             VALUES (?, 'SENT', ?, ?, NULL)
             ON CONFLICT(job_id) DO UPDATE SET
                 status = 'SENT',
                 customer_token_hash = excluded.customer_token_hash,
                 sent_at = excluded.sent_at,
                 decided_at = NULL",
        )
        .bind(&job.id.0)
        .bind(&token_hash)
        .bind(now_string())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        let url = token::approval_url(&self.public_base_url, &job.id.0, &raw_token);
        append_event(&mut *tx, &job.id, &EventPayload::ApprovalSent { url: url.clone() }, Some(&actor.id))
            .await?;

        sqlx::query("UPDATE job SET status = ? WHERE id = ?")
            .bind(JobState::WaitingApproval.as_str())
            .bind(&job.id.0)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        let payload = EventPayload::StateChange {
            from_state: Some(JobState::Diagnosis),
            to_state: JobState::WaitingApproval,
            reason: None,
        };
        append_event(&mut *tx, &job.id, &payload, Some(&actor.id)).await?;

        tx.commit().await.map_err(map_sqlx)?;
        Ok(url)
    }

    async fn pending_review(&self, job_id: &JobId, token: &str) -> EngineResult<ApprovalReview> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx)?;
        let request = self.load_request(&mut *conn, job_id).await?;
        drop(conn);
        self.check_live(request.as_ref(), token)?;

        self.load_review(job_id, LineItemStatus::Proposed).await
    }

    async fn decide(
        &self,
        job_id: &JobId,
        token: &str,
        decision: ApprovalDecision,
    ) -> EngineResult<ApprovalReview> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let request = self.load_request(&mut *tx, job_id).await?;
        self.check_live(request.as_ref(), token)?;
        let token_hash =
            request.map(|request| request.customer_token_hash).unwrap_or_default();

        // Compare-and-set against the exact row we verified; a concurrent
        // decision makes this touch zero rows and the whole attempt becomes a
        // no-op NotFound.
        let updated = sqlx::query(
            "UPDATE approval_request SET status = ?, decided_at = ?
             WHERE job_id = ? AND status = 'SENT' AND decided_at IS NULL
               AND customer_token_hash = ?",
        )
        .bind(decision.terminal_status().as_str())
        .bind(now_string())
        .bind(&job_id.0)
        .bind(&token_hash)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        if updated.rows_affected() != 1 {
            return Err(EngineError::NotFound);
        }

        sqlx::query("UPDATE line_item SET status = ? WHERE job_id = ? AND status = 'PROPOSED'")
            .bind(decision.line_item_status().as_str())
            .bind(&job_id.0)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        // Customer-originated: no actor.
        append_event(&mut *tx, job_id, &EventPayload::ApprovalDecided { decision }, None).await?;

        if decision == ApprovalDecision::Approve {
            let current: String = sqlx::query_scalar("SELECT status FROM job WHERE id = ?")
                .bind(&job_id.0)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_sqlx)?;
            let from_state = current.parse::<JobState>().map_err(EngineError::Persistence)?;

            sqlx::query("UPDATE job SET status = ? WHERE id = ?")
                .bind(JobState::ApprovedReady.as_str())
                .bind(&job_id.0)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx)?;
            let payload = EventPayload::StateChange {
                from_state: Some(from_state),
                to_state: JobState::ApprovedReady,
                reason: None,
            };
            append_event(&mut *tx, job_id, &payload, None).await?;
        }

        tx.commit().await.map_err(map_sqlx)?;

        self.load_review(job_id, decision.line_item_status()).await
    }
}

fn summarize_vehicle(
    year: Option<i64>,
    make: Option<String>,
    model: Option<String>,
    trim: Option<String>,
) -> String {
    shopfloor_core::domain::customer::Vehicle {
        id: shopfloor_core::domain::customer::VehicleId(String::new()),
        shop_id: shopfloor_core::domain::principal::ShopId(String::new()),
        customer_id: shopfloor_core::domain::customer::CustomerId(String::new()),
        year,
        make,
        model,
        trim,
    }
    .summary()
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use shopfloor_core::domain::approval::ApprovalDecision;
    use shopfloor_core::domain::job::{JobPriority, JobState, NewJob};
    use shopfloor_core::domain::principal::{Principal, Role};
    use shopfloor_core::errors::EngineError;

    use super::SqlApprovalStore;
    use crate::stores::{ApprovalWorkflow, JobWorkflow, SqlJobStore};
    use crate::{connect_with_settings, migrations, DbPool};

    const BASE_URL: &str = "https://portal.example";

    fn secret() -> SecretString {
        "test-approval-secret".to_string().into()
    }

    async fn test_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        sqlx::query("INSERT INTO shop (id, name, created_at) VALUES ('shop-1', 'Occono Auto', '2026-01-01T00:00:00Z')")
            .execute(&pool)
            .await
            .expect("insert shop");
        sqlx::query(
            "INSERT INTO shop_user (id, shop_id, name, role, active, created_at) VALUES
             ('adv-1', 'shop-1', 'Andy', 'ADVISOR', 1, '2026-01-01T00:00:00Z'),
             ('tech-1', 'shop-1', 'Tess', 'TECH', 1, '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("insert users");
        pool
    }

    fn advisor() -> Principal {
        Principal::new("adv-1", Role::Advisor, "shop-1")
    }

    async fn job_in_diagnosis(pool: &DbPool) -> shopfloor_core::domain::job::Job {
        let jobs = SqlJobStore::new(pool.clone());
        let job = jobs
            .create_job(
                &advisor(),
                NewJob {
                    title: "Brake noise diagnosis".to_string(),
                    customer_name: "Jordan Lee".to_string(),
                    vehicle_year: Some(2018),
                    vehicle_make: Some("Toyota".to_string()),
                    vehicle_model: Some("Camry".to_string()),
                    vehicle_trim: Some("SE".to_string()),
                    priority: JobPriority::Normal,
                    assigned_tech_id: "tech-1".to_string(),
                },
            )
            .await
            .expect("create job");
        jobs.transition_job(&advisor(), &job.id, JobState::Diagnosis, None)
            .await
            .expect("to diagnosis")
    }

    fn token_from(url: &str) -> String {
        url.split("?t=").nth(1).expect("token query parameter").to_string()
    }

    #[tokio::test]
    async fn approval_can_only_be_requested_from_diagnosis() {
        let pool = test_pool().await;
        let store = SqlApprovalStore::new(pool.clone(), secret(), BASE_URL);
        let jobs = SqlJobStore::new(pool.clone());
        let job = job_in_diagnosis(&pool).await;

        // CHECKED_IN job (fresh create) is not eligible.
        let fresh = jobs
            .create_job(
                &advisor(),
                NewJob {
                    title: "Oil change".to_string(),
                    customer_name: "Sam".to_string(),
                    vehicle_year: None,
                    vehicle_make: None,
                    vehicle_model: None,
                    vehicle_trim: None,
                    priority: JobPriority::Low,
                    assigned_tech_id: "tech-1".to_string(),
                },
            )
            .await
            .expect("create");
        let result = store.request_approval(&advisor(), &fresh.id).await;
        assert!(matches!(result, Err(EngineError::InvalidTransition { .. })));

        let url = store.request_approval(&advisor(), &job.id).await.expect("request");
        assert!(url.starts_with(&format!("{BASE_URL}/approve/{}", job.id.0)));

        let moved = jobs.get_job(&advisor(), &job.id).await.expect("reload");
        assert_eq!(moved.state, JobState::WaitingApproval);
    }

    #[tokio::test]
    async fn pending_review_requires_the_exact_live_token() {
        let pool = test_pool().await;
        let store = SqlApprovalStore::new(pool.clone(), secret(), BASE_URL);
        let job = job_in_diagnosis(&pool).await;

        let url = store.request_approval(&advisor(), &job.id).await.expect("request");
        let token = token_from(&url);

        let review = store.pending_review(&job.id, &token).await.expect("review");
        assert_eq!(review.shop_name, "Occono Auto");
        assert_eq!(review.vehicle_summary, "2018 Toyota Camry SE");

        let wrong = store.pending_review(&job.id, "00000000000000000000000000000000").await;
        assert_eq!(wrong.unwrap_err(), EngineError::NotFound);

        let missing = store
            .pending_review(&shopfloor_core::domain::job::JobId("job-x".to_string()), &token)
            .await;
        assert_eq!(missing.unwrap_err(), EngineError::NotFound);
    }

    #[tokio::test]
    async fn reissuing_invalidates_the_previous_link() {
        let pool = test_pool().await;
        let store = SqlApprovalStore::new(pool.clone(), secret(), BASE_URL);
        let jobs = SqlJobStore::new(pool.clone());
        let job = job_in_diagnosis(&pool).await;

        let first_url = store.request_approval(&advisor(), &job.id).await.expect("first");
        let first_token = token_from(&first_url);

        jobs.transition_job(
            &advisor(),
            &job.id,
            JobState::Diagnosis,
            Some("estimate revised".to_string()),
        )
        .await
        .expect("back to diagnosis");
        let second_url = store.request_approval(&advisor(), &job.id).await.expect("second");
        let second_token = token_from(&second_url);

        assert_ne!(first_token, second_token);
        assert_eq!(
            store.pending_review(&job.id, &first_token).await.unwrap_err(),
            EngineError::NotFound,
        );
        assert!(store.pending_review(&job.id, &second_token).await.is_ok());
    }

    #[tokio::test]
    async fn decided_links_are_no_longer_reviewable() {
        let pool = test_pool().await;
        let store = SqlApprovalStore::new(pool.clone(), secret(), BASE_URL);
        let job = job_in_diagnosis(&pool).await;

        let url = store.request_approval(&advisor(), &job.id).await.expect("request");
        let token = token_from(&url);

        store.decide(&job.id, &token, ApprovalDecision::Decline).await.expect("decide");

        assert_eq!(
            store.pending_review(&job.id, &token).await.unwrap_err(),
            EngineError::NotFound,
        );
    }
}
