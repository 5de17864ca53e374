use async_trait::async_trait;

use shopfloor_core::domain::job::JobId;
use shopfloor_core::domain::media::{InspectionMedia, MediaId, NewMedia};
use shopfloor_core::domain::principal::Principal;
use shopfloor_core::errors::{EngineError, EngineResult};
use shopfloor_core::policy;

use super::jobs::load_job;
use super::{decode_media_row, map_sqlx, new_id, now_string, parse_timestamp, MediaLog};
use crate::DbPool;

/// Inspection photos and videos shown to the customer on the approval page.
pub struct SqlMediaStore {
    pool: DbPool,
}

impl SqlMediaStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaLog for SqlMediaStore {
    async fn add_media(
        &self,
        actor: &Principal,
        job_id: &JobId,
        input: NewMedia,
    ) -> EngineResult<InspectionMedia> {
        if !policy::can_manage_jobs(actor.role) {
            return Err(EngineError::Forbidden);
        }
        let url = input.url.trim();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(EngineError::Validation("media url must be http(s)".to_string()));
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let job = load_job(&mut *tx, job_id, &actor.shop_id).await?;

        let id = new_id("media");
        let created_at = now_string();
        sqlx::query(
            "INSERT INTO inspection_media (id, job_id, media_type, url, caption, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&job.id.0)
        .bind(input.media_type.as_str())
        .bind(url)
        .bind(input.caption.as_deref())
        .bind(&created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        tx.commit().await.map_err(map_sqlx)?;

        Ok(InspectionMedia {
            id: MediaId(id),
            job_id: job.id,
            media_type: input.media_type,
            url: url.to_string(),
            caption: input.caption,
            created_at: parse_timestamp(&created_at)?,
        })
    }

    async fn list_media(
        &self,
        actor: &Principal,
        job_id: &JobId,
    ) -> EngineResult<Vec<InspectionMedia>> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx)?;
        let job = load_job(&mut *conn, job_id, &actor.shop_id).await?;

        let rows = sqlx::query("SELECT * FROM inspection_media WHERE job_id = ? ORDER BY created_at")
            .bind(&job.id.0)
            .fetch_all(&mut *conn)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(decode_media_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use shopfloor_core::domain::job::{JobPriority, NewJob};
    use shopfloor_core::domain::media::{MediaType, NewMedia};
    use shopfloor_core::domain::principal::{Principal, Role};
    use shopfloor_core::errors::EngineError;

    use super::SqlMediaStore;
    use crate::stores::{JobWorkflow, MediaLog, SqlJobStore};
    use crate::{connect_with_settings, migrations, DbPool};

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

    #[tokio::test]
    async fn media_requires_an_http_url() {
        let pool = test_pool().await;
        let store = SqlMediaStore::new(pool.clone());
        let job = SqlJobStore::new(pool.clone())
            .create_job(
                &advisor(),
                NewJob {
                    title: "Inspection".to_string(),
                    customer_name: "Jordan Lee".to_string(),
                    vehicle_year: None,
                    vehicle_make: None,
                    vehicle_model: None,
                    vehicle_trim: None,
                    priority: JobPriority::Normal,
                    assigned_tech_id: "tech-1".to_string(),
                },
            )
            .await
            .expect("create job");

        let bad = store
            .add_media(
                &advisor(),
                &job.id,
                NewMedia {
                    media_type: MediaType::Photo,
                    url: "ftp://nope".to_string(),
                    caption: None,
                },
            )
            .await;
        assert!(matches!(bad, Err(EngineError::Validation(_))));

        store
            .add_media(
                &advisor(),
                &job.id,
                NewMedia {
                    media_type: MediaType::Photo,
                    url: "https://cdn.example/pads.jpg".to_string(),
                    caption: Some("Worn pads".to_string()),
                },
            )
            .await
            .expect("add photo");

        let listed = store.list_media(&advisor(), &job.id).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].caption.as_deref(), Some("Worn pads"));

        let tech = Principal::new("tech-1", Role::Tech, "shop-1");
        let forbidden = store
            .add_media(
                &tech,
                &job.id,
                NewMedia {
                    media_type: MediaType::Video,
                    url: "https://cdn.example/walkthrough.mp4".to_string(),
                    caption: None,
                },
            )
            .await;
        assert_eq!(forbidden.unwrap_err(), EngineError::Forbidden);
    }
}
