//! Deterministic demo dataset: one shop mid-workweek, with one job under
//! diagnosis and one job already waiting on the customer.

use secrecy::SecretString;
use sqlx::Row;

use shopfloor_core::domain::job::{JobPriority, JobState, NewJob};
use shopfloor_core::domain::line_item::{LineItemType, NewLineItem};
use shopfloor_core::domain::media::{MediaType, NewMedia};
use shopfloor_core::domain::principal::{Principal, Role};
use shopfloor_core::errors::{EngineError, EngineResult};

use crate::stores::{
    ApprovalWorkflow, JobWorkflow, LineItemLedger, MediaLog, SqlApprovalStore, SqlJobStore,
    SqlLineItemStore, SqlMediaStore,
};
use crate::DbPool;

pub const SEED_SHOP_ID: &str = "shop-occono";
pub const SEED_ADVISOR_ID: &str = "user-andy";

const SEED_USERS: &[(&str, &str, &str)] = &[
    ("user-olivia", "Olivia Grant", "OWNER"),
    ("user-andy", "Andy Reyes", "ADVISOR"),
    ("user-tess", "Tess Okafor", "TECH"),
    ("user-raul", "Raul Mendes", "TECH"),
];

#[derive(Clone, Debug)]
pub struct SeedResult {
    pub shop_id: String,
    pub job_ids: Vec<String>,
    /// Live link for the job left in WAITING_APPROVAL, for manual testing.
    pub approval_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SeedVerification {
    pub shops: i64,
    pub users: i64,
    pub jobs: i64,
    pub events: i64,
    pub line_items: i64,
}

impl SeedVerification {
    pub fn ok(&self) -> bool {
        self.shops >= 1 && self.users >= 4 && self.jobs >= 2 && self.events >= self.jobs
    }
}

/// Populate the demo shop. Safe to re-run: if the shop already has jobs the
/// dataset is left untouched.
pub async fn seed_demo(
    pool: &DbPool,
    secret: &SecretString,
    public_base_url: &str,
) -> EngineResult<SeedResult> {
    let now = "2026-01-05T08:00:00.000000Z";

    sqlx::query("INSERT OR IGNORE INTO shop (id, name, created_at) VALUES (?, ?, ?)")
        .bind(SEED_SHOP_ID)
        .bind("Occono Auto")
        .bind(now)
        .execute(pool)
        .await
        .map_err(|err| EngineError::Persistence(err.to_string()))?;

    for (id, name, role) in SEED_USERS {
        sqlx::query(
            "INSERT OR IGNORE INTO shop_user (id, shop_id, name, role, active, created_at)
             VALUES (?, ?, ?, ?, 1, ?)",
        )
        .bind(id)
        .bind(SEED_SHOP_ID)
        .bind(name)
        .bind(role)
        .bind(now)
        .execute(pool)
        .await
        .map_err(|err| EngineError::Persistence(err.to_string()))?;
    }

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job WHERE shop_id = ?")
        .bind(SEED_SHOP_ID)
        .fetch_one(pool)
        .await
        .map_err(|err| EngineError::Persistence(err.to_string()))?;
    if existing > 0 {
        return Ok(SeedResult {
            shop_id: SEED_SHOP_ID.to_string(),
            job_ids: Vec::new(),
            approval_url: None,
        });
    }

    let advisor = Principal::new(SEED_ADVISOR_ID, Role::Advisor, SEED_SHOP_ID);
    let jobs = SqlJobStore::new(pool.clone());
    let items = SqlLineItemStore::new(pool.clone());
    let media = SqlMediaStore::new(pool.clone());
    let approvals = SqlApprovalStore::new(pool.clone(), secret.clone(), public_base_url);

    // Job 1001: still under diagnosis.
    let brake_job = jobs
        .create_job(
            &advisor,
            NewJob {
                title: "Brake noise and pulsation".to_string(),
                customer_name: "Jordan Lee".to_string(),
                vehicle_year: Some(2018),
                vehicle_make: Some("Toyota".to_string()),
                vehicle_model: Some("Camry".to_string()),
                vehicle_trim: Some("SE".to_string()),
                priority: JobPriority::High,
                assigned_tech_id: "user-tess".to_string(),
            },
        )
        .await?;
    jobs.transition_job(&advisor, &brake_job.id, JobState::Diagnosis, None).await?;
    items
        .add_line_item(
            &advisor,
            &brake_job.id,
            NewLineItem {
                item_type: LineItemType::Labor,
                name: "Brake inspection and diagnosis".to_string(),
                qty: 1,
                unit_price_cents: 8900,
                labor_hours: Some(1.0),
                taxable: false,
            },
        )
        .await?;
    items
        .add_line_item(
            &advisor,
            &brake_job.id,
            NewLineItem {
                item_type: LineItemType::Part,
                name: "Front brake pads".to_string(),
                qty: 1,
                unit_price_cents: 4800,
                labor_hours: None,
                taxable: true,
            },
        )
        .await?;
    media
        .add_media(
            &advisor,
            &brake_job.id,
            NewMedia {
                media_type: MediaType::Photo,
                url: "https://media.example/occono/brake-pads.jpg".to_string(),
                caption: Some("Front pads at 2mm".to_string()),
            },
        )
        .await?;

    // Job 1002: estimate already with the customer.
    let service_job = jobs
        .create_job(
            &advisor,
            NewJob {
                title: "30k mile service".to_string(),
                customer_name: "Maya Patel".to_string(),
                vehicle_year: Some(2020),
                vehicle_make: Some("Honda".to_string()),
                vehicle_model: Some("Civic".to_string()),
                vehicle_trim: None,
                priority: JobPriority::Normal,
                assigned_tech_id: "user-raul".to_string(),
            },
        )
        .await?;
    jobs.transition_job(&advisor, &service_job.id, JobState::Diagnosis, None).await?;
    items
        .add_line_item(
            &advisor,
            &service_job.id,
            NewLineItem {
                item_type: LineItemType::Labor,
                name: "30k service package".to_string(),
                qty: 1,
                unit_price_cents: 10500,
                labor_hours: Some(2.5),
                taxable: false,
            },
        )
        .await?;
    let approval_url = approvals.request_approval(&advisor, &service_job.id).await?;

    Ok(SeedResult {
        shop_id: SEED_SHOP_ID.to_string(),
        job_ids: vec![brake_job.id.0, service_job.id.0],
        approval_url: Some(approval_url),
    })
}

pub async fn verify_seed(pool: &DbPool) -> EngineResult<SeedVerification> {
    let row = sqlx::query(
        "SELECT
            (SELECT COUNT(*) FROM shop) AS shops,
            (SELECT COUNT(*) FROM shop_user) AS users,
            (SELECT COUNT(*) FROM job) AS jobs,
            (SELECT COUNT(*) FROM job_event) AS events,
            (SELECT COUNT(*) FROM line_item) AS line_items",
    )
    .fetch_one(pool)
    .await
    .map_err(|err| EngineError::Persistence(err.to_string()))?;

    Ok(SeedVerification {
        shops: row.get("shops"),
        users: row.get("users"),
        jobs: row.get("jobs"),
        events: row.get("events"),
        line_items: row.get("line_items"),
    })
}
