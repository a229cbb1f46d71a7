//! HTTP surface for the pipeline: scoring ingestion, unused-headline
//! queries, usage marking, and rotation. CORS is wide open because the
//! news-data consumers are browser widgets on other origins.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use tower_http::cors::CorsLayer;

use crate::category::Category;
use crate::pipeline::Pipeline;
use crate::record::{HeadlineDraft, HeadlineRecord, UsageState};
use crate::store::today_utc;

pub type AppState = Arc<Pipeline>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/score", post(score_batch))
        .route("/headlines/unused", get(unused_headline))
        .route("/headlines/next", get(next_headline))
        .route("/headlines/mark-used", post(mark_used))
        .route("/rotate", post(rotate))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

type ApiError = (StatusCode, String);

fn internal(e: anyhow::Error) -> ApiError {
    tracing::error!(error = %e, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
}

async fn score_batch(
    State(state): State<AppState>,
    Json(drafts): Json<Vec<HeadlineDraft>>,
) -> Result<Json<Vec<HeadlineRecord>>, ApiError> {
    let records = state.score_batch(drafts).await.map_err(internal)?;
    Ok(Json(records))
}

#[derive(serde::Deserialize)]
struct HeadlineQuery {
    #[serde(default)]
    category: Option<Category>,
    /// UTC day, `YYYY-MM-DD`; defaults to today.
    #[serde(default)]
    day: Option<NaiveDate>,
}

async fn unused_headline(
    State(state): State<AppState>,
    Query(q): Query<HeadlineQuery>,
) -> Result<Json<Option<HeadlineRecord>>, ApiError> {
    let day = q.day.unwrap_or_else(today_utc);
    let rec = state
        .read_unused_headline(q.category, day)
        .map_err(internal)?;
    Ok(Json(rec))
}

async fn next_headline(
    State(state): State<AppState>,
    Query(q): Query<HeadlineQuery>,
) -> Result<Json<Option<HeadlineRecord>>, ApiError> {
    let rec = state.select_for_commentary(q.category).map_err(internal)?;
    Ok(Json(rec))
}

#[derive(serde::Deserialize)]
struct MarkUsedReq {
    headline: String,
    /// `"True"` for posted, anything else is a terminal skip reason.
    reason: String,
}

#[derive(serde::Serialize)]
struct MarkUsedResp {
    updated: usize,
}

async fn mark_used(
    State(state): State<AppState>,
    Json(body): Json<MarkUsedReq>,
) -> Result<Json<MarkUsedResp>, ApiError> {
    let requested = UsageState::from_field(&body.reason);
    if requested.is_unused() {
        return Err((
            StatusCode::BAD_REQUEST,
            "reason must be \"True\" or a skip reason, not \"False\"".to_string(),
        ));
    }
    let updated = state
        .mark_used(&body.headline, requested)
        .map_err(internal)?;
    Ok(Json(MarkUsedResp { updated }))
}

async fn rotate(State(state): State<AppState>) -> &'static str {
    state.rotate();
    "ok"
}
