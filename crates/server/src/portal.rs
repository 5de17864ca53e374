//! Customer-facing approval portal.
//!
//! Endpoints:
//! - `GET  /approve/{job_id}?t={token}`   — review the pending estimate (HTML)
//! - `POST /approve/{job_id}/decision`    — record approve/decline (form post)
//!
//! The token in the link is the whole credential; there is no customer login.
//! Every failure (unknown job, wrong token, already-decided link) renders the
//! same generic unavailable page so the portal never reveals whether a job
//! exists or whether a link was ever valid.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use tracing::{error, info, warn};

use shopfloor_core::domain::approval::{ApprovalDecision, ApprovalReview};
use shopfloor_core::domain::job::JobId;
use shopfloor_db::stores::{ApprovalWorkflow, SqlApprovalStore};

#[derive(Clone)]
pub struct PortalState {
    approvals: Arc<SqlApprovalStore>,
    templates: Arc<Tera>,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub t: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionForm {
    pub t: Option<String>,
    pub decision: Option<String>,
}

#[derive(Debug, Serialize)]
struct ItemView {
    name: String,
    kind: &'static str,
    qty: i64,
    total: String,
}

#[derive(Debug, Serialize)]
struct MediaView {
    url: String,
    caption: Option<String>,
    kind: &'static str,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Initialize Tera with the portal templates.
fn init_templates() -> Arc<Tera> {
    let mut tera = match Tera::new("templates/portal/**/*") {
        Ok(t) => t,
        Err(e) => {
            warn!(error = %e, "Failed to load portal templates from filesystem, using empty Tera instance");
            Tera::default()
        }
    };

    // Built-in fallbacks in case filesystem templates are not available
    tera.add_raw_template(
        "approval.html",
        include_str!("../../../templates/portal/approval.html"),
    )
    .ok();
    tera.add_raw_template(
        "decision.html",
        include_str!("../../../templates/portal/decision.html"),
    )
    .ok();
    tera.add_raw_template(
        "unavailable.html",
        include_str!("../../../templates/portal/unavailable.html"),
    )
    .ok();

    Arc::new(tera)
}

pub fn router(approvals: Arc<SqlApprovalStore>) -> Router {
    Router::new()
        .route("/approve/{job_id}", get(view_approval_page))
        .route("/approve/{job_id}/decision", post(submit_decision))
        .with_state(PortalState { approvals, templates: init_templates() })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn view_approval_page(
    State(state): State<PortalState>,
    Path(job_id): Path<String>,
    Query(query): Query<TokenQuery>,
) -> (StatusCode, Html<String>) {
    let Some(token) = query.t.filter(|value| !value.is_empty()) else {
        return unavailable(&state);
    };

    match state.approvals.pending_review(&JobId(job_id), &token).await {
        Ok(review) => {
            let mut context = review_context(&review);
            context.insert("token", &token);
            render(&state, "approval.html", &context)
        }
        Err(_) => unavailable(&state),
    }
}

async fn submit_decision(
    State(state): State<PortalState>,
    Path(job_id): Path<String>,
    Form(form): Form<DecisionForm>,
) -> (StatusCode, Html<String>) {
    let Some(token) = form.t.filter(|value| !value.is_empty()) else {
        return unavailable(&state);
    };
    let Some(decision) =
        form.decision.as_deref().and_then(|value| value.parse::<ApprovalDecision>().ok())
    else {
        return unavailable(&state);
    };

    match state.approvals.decide(&JobId(job_id), &token, decision).await {
        Ok(review) => {
            info!(
                event_name = "portal.approval.decided",
                job_id = %review.job_id.0,
                decision = ?decision,
                "customer decision recorded"
            );
            let mut context = review_context(&review);
            context.insert("approved", &matches!(decision, ApprovalDecision::Approve));
            render(&state, "decision.html", &context)
        }
        Err(_) => unavailable(&state),
    }
}

// ---------------------------------------------------------------------------
// Rendering helpers
// ---------------------------------------------------------------------------

fn review_context(review: &ApprovalReview) -> Context {
    let items: Vec<ItemView> = review
        .line_items
        .iter()
        .map(|item| ItemView {
            name: item.name.clone(),
            kind: item.item_type.as_str(),
            qty: item.qty,
            total: format_cents(item.total_cents()),
        })
        .collect();
    let media: Vec<MediaView> = review
        .media
        .iter()
        .map(|media| MediaView {
            url: media.url.clone(),
            caption: media.caption.clone(),
            kind: media.media_type.as_str(),
        })
        .collect();

    let mut context = Context::new();
    context.insert("job_id", &review.job_id.0);
    context.insert("shop_name", &review.shop_name);
    context.insert("job_title", &review.job_title);
    context.insert("vehicle", &review.vehicle_summary);
    context.insert("items", &items);
    context.insert("media", &media);
    context.insert("total", &format_cents(review.total_cents));
    context
}

fn render(state: &PortalState, template: &str, context: &Context) -> (StatusCode, Html<String>) {
    match state.templates.render(template, context) {
        Ok(html) => (StatusCode::OK, Html(html)),
        Err(e) => {
            error!(error = %e, template, "portal template render failed");
            unavailable(state)
        }
    }
}

/// The one page every portal failure collapses to.
fn unavailable(state: &PortalState) -> (StatusCode, Html<String>) {
    let html = state
        .templates
        .render("unavailable.html", &Context::new())
        .unwrap_or_else(|_| "<h1>This link is no longer available.</h1>".to_string());
    (StatusCode::NOT_FOUND, Html(html))
}

fn format_cents(cents: i64) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}
