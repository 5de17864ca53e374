use async_trait::async_trait;

use shopfloor_core::domain::job::JobId;
use shopfloor_core::domain::line_item::{LineItem, LineItemId, LineItemStatus, NewLineItem};
use shopfloor_core::domain::principal::Principal;
use shopfloor_core::errors::{EngineError, EngineResult};
use shopfloor_core::policy;

use super::jobs::load_job;
use super::{
    decode_line_item_row, is_unique_violation, map_sqlx, new_id, now_string, LineItemLedger,
};
use crate::DbPool;

/// Proposed work on a job. Items enter as PROPOSED and change status only
/// through the approval cascade.
pub struct SqlLineItemStore {
    pool: DbPool,
}

impl SqlLineItemStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LineItemLedger for SqlLineItemStore {
    async fn add_line_item(
        &self,
        actor: &Principal,
        job_id: &JobId,
        input: NewLineItem,
    ) -> EngineResult<LineItem> {
        if !policy::can_manage_jobs(actor.role) {
            return Err(EngineError::Forbidden);
        }
        if input.name.trim().is_empty() {
            return Err(EngineError::Validation("line item name must not be empty".to_string()));
        }
        if input.qty < 1 {
            return Err(EngineError::Validation("qty must be at least 1".to_string()));
        }
        if input.unit_price_cents < 0 {
            return Err(EngineError::Validation("unit_price_cents must not be negative".to_string()));
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let job = load_job(&mut *tx, job_id, &actor.shop_id).await?;
        if job.is_closed() {
            return Err(EngineError::Validation("cannot add items to a closed job".to_string()));
        }

        // Creation order; the unique (job_id, sort_order) index arbitrates
        // concurrent adds.
        let sort_order: i64 =
            sqlx::query_scalar("SELECT COUNT(*) + 1 FROM line_item WHERE job_id = ?")
                .bind(&job.id.0)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_sqlx)?;

        let id = new_id("li");
        let insert = sqlx::query(
            "INSERT INTO line_item (id, job_id, item_type, name, qty, unit_price_cents,
                                    labor_hours, taxable, status, sort_order, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&job.id.0)
        .bind(input.item_type.as_str())
        .bind(input.name.trim())
        .bind(input.qty)
        .bind(input.unit_price_cents)
        .bind(input.labor_hours)
        .bind(input.taxable as i64)
        .bind(LineItemStatus::Proposed.as_str())
        .bind(sort_order)
        .bind(now_string())
        .execute(&mut *tx)
        .await;
        if let Err(err) = insert {
            if is_unique_violation(&err) {
                return Err(EngineError::Conflict(format!(
                    "sort order {sort_order} was taken by a concurrent add"
                )));
            }
            return Err(map_sqlx(err));
        }
        tx.commit().await.map_err(map_sqlx)?;

        Ok(LineItem {
            id: LineItemId(id),
            job_id: job.id,
            item_type: input.item_type,
            name: input.name.trim().to_string(),
            qty: input.qty,
            unit_price_cents: input.unit_price_cents,
            labor_hours: input.labor_hours,
            taxable: input.taxable,
            status: LineItemStatus::Proposed,
            sort_order,
        })
    }

    async fn list_line_items(
        &self,
        actor: &Principal,
        job_id: &JobId,
    ) -> EngineResult<Vec<LineItem>> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx)?;
        let job = load_job(&mut *conn, job_id, &actor.shop_id).await?;

        let rows = sqlx::query("SELECT * FROM line_item WHERE job_id = ? ORDER BY sort_order")
            .bind(&job.id.0)
            .fetch_all(&mut *conn)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(decode_line_item_row).collect()
    }
}
