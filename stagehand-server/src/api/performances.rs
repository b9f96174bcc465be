//! Performance passports: details, status, cast and crew, required
//! inventory, readiness tasks

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use stagehand_common::auth::Permission;
use stagehand_common::pagination::{Page, PageParams};
use tracing::info;

use super::CurrentUser;
use crate::db::performances::{
    self, Performance, PerformanceFilter, PerformanceInput, ReadinessTask, RequiredItem,
    RequiredItemInput, StaffInput, StaffMember, TaskInput, TaskUpdate,
};
use crate::services::readiness::{self, Readiness};
use crate::services::workflow::PerformanceStatus;
use crate::{ApiResult, AppState};

pub async fn list_performances(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(page): Query<PageParams>,
    Query(filter): Query<PerformanceFilter>,
) -> ApiResult<Json<Page<Performance>>> {
    user.require(Permission::PerformancesRead)?;
    Ok(Json(
        performances::list_performances(&state.db, user.theater_id, &filter, page).await?,
    ))
}

pub async fn create_performance(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<PerformanceInput>,
) -> ApiResult<(StatusCode, Json<Performance>)> {
    user.require(Permission::PerformancesWrite)?;
    let performance = performances::create_performance(&state.db, user.theater_id, &input).await?;
    info!(
        "Performance {} '{}' created by {}",
        performance.id, performance.title, user.username
    );
    Ok((StatusCode::CREATED, Json(performance)))
}

pub async fn get_performance(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Performance>> {
    user.require(Permission::PerformancesRead)?;
    Ok(Json(performances::get_performance(&state.db, user.theater_id, id).await?))
}

pub async fn update_performance(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(input): Json<PerformanceInput>,
) -> ApiResult<Json<Performance>> {
    user.require(Permission::PerformancesWrite)?;
    Ok(Json(
        performances::update_performance(&state.db, user.theater_id, id, &input).await?,
    ))
}

pub async fn delete_performance(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    user.require(Permission::PerformancesWrite)?;
    performances::delete_performance(&state.db, user.theater_id, id).await?;
    info!("Performance {} deleted by {}", id, user.username);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: PerformanceStatus,
}

/// POST /api/performances/:id/status
pub async fn change_status(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<Json<Performance>> {
    user.require(Permission::PerformancesWrite)?;
    Ok(Json(
        performances::change_status(&state.db, user.theater_id, id, req.status).await?,
    ))
}

// Cast & crew

pub async fn list_staff(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<StaffMember>>> {
    user.require(Permission::PerformancesRead)?;
    Ok(Json(performances::list_staff(&state.db, user.theater_id, id).await?))
}

pub async fn add_staff(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(input): Json<StaffInput>,
) -> ApiResult<(StatusCode, Json<StaffMember>)> {
    user.require(Permission::PerformancesWrite)?;
    let member = performances::add_staff(&state.db, user.theater_id, id, &input).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn remove_staff(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((id, staff_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    user.require(Permission::PerformancesWrite)?;
    performances::remove_staff(&state.db, user.theater_id, id, staff_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Required inventory

pub async fn list_required_items(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<RequiredItem>>> {
    user.require(Permission::PerformancesRead)?;
    Ok(Json(
        performances::list_required_items(&state.db, user.theater_id, id).await?,
    ))
}

/// PUT /api/performances/:id/items/:item_id
pub async fn set_required_item(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((id, item_id)): Path<(i64, i64)>,
    Json(input): Json<RequiredItemInput>,
) -> ApiResult<Json<RequiredItem>> {
    user.require(Permission::PerformancesWrite)?;
    Ok(Json(
        performances::set_required_item(&state.db, user.theater_id, id, item_id, &input).await?,
    ))
}

pub async fn remove_required_item(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((id, item_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    user.require(Permission::PerformancesWrite)?;
    performances::remove_required_item(&state.db, user.theater_id, id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Readiness

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<ReadinessTask>>> {
    user.require(Permission::PerformancesRead)?;
    Ok(Json(performances::list_tasks(&state.db, user.theater_id, id).await?))
}

pub async fn add_task(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(input): Json<TaskInput>,
) -> ApiResult<(StatusCode, Json<ReadinessTask>)> {
    user.require(Permission::PerformancesWrite)?;
    let task = performances::add_task(&state.db, user.theater_id, id, &input).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((id, task_id)): Path<(i64, i64)>,
    Json(update): Json<TaskUpdate>,
) -> ApiResult<Json<ReadinessTask>> {
    user.require(Permission::PerformancesWrite)?;
    Ok(Json(
        performances::update_task(&state.db, user.theater_id, id, task_id, &update).await?,
    ))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((id, task_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    user.require(Permission::PerformancesWrite)?;
    performances::delete_task(&state.db, user.theater_id, id, task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/performances/:id/readiness
pub async fn get_readiness(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Readiness>> {
    user.require(Permission::PerformancesRead)?;
    Ok(Json(
        readiness::performance_readiness(&state.db, user.theater_id, id).await?,
    ))
}

pub fn performance_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/performances",
            get(list_performances).post(create_performance),
        )
        .route(
            "/api/performances/:id",
            get(get_performance)
                .put(update_performance)
                .delete(delete_performance),
        )
        .route("/api/performances/:id/status", post(change_status))
        .route("/api/performances/:id/staff", get(list_staff).post(add_staff))
        .route(
            "/api/performances/:id/staff/:staff_id",
            delete(remove_staff),
        )
        .route("/api/performances/:id/items", get(list_required_items))
        .route(
            "/api/performances/:id/items/:item_id",
            put(set_required_item).delete(remove_required_item),
        )
        .route("/api/performances/:id/tasks", get(list_tasks).post(add_task))
        .route(
            "/api/performances/:id/tasks/:task_id",
            put(update_task).delete(delete_task),
        )
        .route("/api/performances/:id/readiness", get(get_readiness))
}
