//! Read-only summaries for dashboards
//!
//! All endpoints need `AnalyticsRead`.

use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use stagehand_common::auth::Permission;
use stagehand_common::time;

use super::CurrentUser;
use crate::db::analytics::{self, DocumentSummary, InventorySummary, PerformanceStatusCount};
use crate::services::readiness::{self, Readiness};
use crate::services::scheduling::{self, ScheduleSummary};
use crate::{ApiResult, AppState};

/// Dashboard schedule window
const DASHBOARD_DAYS: i64 = 7;

#[derive(Debug, Serialize)]
pub struct PreparationReadiness {
    pub title: String,
    pub readiness: Readiness,
}

#[derive(Debug, Serialize)]
pub struct PerformanceSummary {
    pub by_status: Vec<PerformanceStatusCount>,
    /// Performances still in preparation
    pub preparation: Vec<PreparationReadiness>,
}

async fn performance_summary(pool: &SqlitePool, theater_id: i64) -> ApiResult<PerformanceSummary> {
    let by_status = analytics::performance_status_counts(pool, theater_id).await?;

    let mut preparation = Vec::new();
    for (id, title) in analytics::preparation_performances(pool, theater_id).await? {
        let readiness = readiness::performance_readiness(pool, theater_id, id).await?;
        preparation.push(PreparationReadiness { title, readiness });
    }

    Ok(PerformanceSummary {
        by_status,
        preparation,
    })
}

pub async fn inventory_analytics(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<InventorySummary>> {
    user.require(Permission::AnalyticsRead)?;
    Ok(Json(analytics::inventory_summary(&state.db, user.theater_id).await?))
}

pub async fn document_analytics(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<DocumentSummary>> {
    user.require(Permission::AnalyticsRead)?;
    Ok(Json(analytics::document_summary(&state.db, user.theater_id).await?))
}

pub async fn performance_analytics(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<PerformanceSummary>> {
    user.require(Permission::AnalyticsRead)?;
    Ok(Json(performance_summary(&state.db, user.theater_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct WindowParams {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// GET /api/analytics/schedule?from=&to=
pub async fn schedule_analytics(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(window): Query<WindowParams>,
) -> ApiResult<Json<ScheduleSummary>> {
    user.require(Permission::AnalyticsRead)?;
    Ok(Json(
        scheduling::schedule_summary(
            &state.db,
            user.theater_id,
            &state.settings,
            window.from,
            window.to,
        )
        .await?,
    ))
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub inventory: InventorySummary,
    pub documents: DocumentSummary,
    pub performances: PerformanceSummary,
    pub schedule: ScheduleSummary,
}

/// GET /api/analytics/dashboard
///
/// The four summaries; the schedule covers the next seven days.
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Dashboard>> {
    user.require(Permission::AnalyticsRead)?;

    let from = time::now();
    let to = from + time::days(DASHBOARD_DAYS);

    Ok(Json(Dashboard {
        inventory: analytics::inventory_summary(&state.db, user.theater_id).await?,
        documents: analytics::document_summary(&state.db, user.theater_id).await?,
        performances: performance_summary(&state.db, user.theater_id).await?,
        schedule: scheduling::schedule_summary(&state.db, user.theater_id, &state.settings, from, to)
            .await?,
    }))
}

pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analytics/inventory", get(inventory_analytics))
        .route("/api/analytics/documents", get(document_analytics))
        .route("/api/analytics/performances", get(performance_analytics))
        .route("/api/analytics/schedule", get(schedule_analytics))
        .route("/api/analytics/dashboard", get(dashboard))
}
