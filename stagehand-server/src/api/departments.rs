//! Departments
//!
//! Readable by every user; changes need `VenuesWrite`, the same permission
//! that manages the rest of the theater's structure.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use stagehand_common::auth::Permission;
use stagehand_common::pagination::{Page, PageParams};
use tracing::info;

use super::CurrentUser;
use crate::db::departments::{self, Department, DepartmentFilter, DepartmentInput};
use crate::{ApiResult, AppState};

pub async fn list_departments(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(page): Query<PageParams>,
    Query(filter): Query<DepartmentFilter>,
) -> ApiResult<Json<Page<Department>>> {
    Ok(Json(
        departments::list_departments(&state.db, user.theater_id, &filter, page).await?,
    ))
}

pub async fn create_department(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<DepartmentInput>,
) -> ApiResult<(StatusCode, Json<Department>)> {
    user.require(Permission::VenuesWrite)?;
    let department = departments::create_department(&state.db, user.theater_id, &input).await?;
    info!(
        "Department {} ({}) created by {}",
        department.id, department.code, user.username
    );
    Ok((StatusCode::CREATED, Json(department)))
}

pub async fn get_department(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Department>> {
    Ok(Json(departments::get_department(&state.db, user.theater_id, id).await?))
}

pub async fn update_department(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(input): Json<DepartmentInput>,
) -> ApiResult<Json<Department>> {
    user.require(Permission::VenuesWrite)?;
    Ok(Json(
        departments::update_department(&state.db, user.theater_id, id, &input).await?,
    ))
}

pub async fn delete_department(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    user.require(Permission::VenuesWrite)?;
    departments::delete_department(&state.db, user.theater_id, id).await?;
    info!("Department {} deleted by {}", id, user.username);
    Ok(StatusCode::NO_CONTENT)
}

pub fn department_routes() -> Router<AppState> {
    Router::new()
        .route("/api/departments", get(list_departments).post(create_department))
        .route(
            "/api/departments/:id",
            get(get_department)
                .put(update_department)
                .delete(delete_department),
        )
}
