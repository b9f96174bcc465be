//! User administration
//!
//! Everything here requires `UsersManage`, except that users may read their
//! own record.

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
use crate::db::users::{self, NewUser, User, UserFilter, UserUpdate};
use crate::{ApiError, ApiResult, AppState};

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(page): Query<PageParams>,
    Query(filter): Query<UserFilter>,
) -> ApiResult<Json<Page<User>>> {
    user.require(Permission::UsersManage)?;
    Ok(Json(users::list_users(&state.db, user.theater_id, &filter, page).await?))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    user.require(Permission::UsersManage)?;
    let created = users::create_user(&state.db, user.theater_id, &input).await?;
    info!(
        "User {} ({}) created by {}",
        created.username,
        created.role.as_str(),
        user.username
    );
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<User>> {
    if id != user.id {
        user.require(Permission::UsersManage)?;
    }
    Ok(Json(users::get_user(&state.db, user.theater_id, id).await?))
}

/// PUT /api/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(update): Json<UserUpdate>,
) -> ApiResult<Json<User>> {
    user.require(Permission::UsersManage)?;
    if id == user.id && update.is_active == Some(false) {
        return Err(ApiError::BadRequest("You cannot deactivate yourself".into()));
    }
    let updated = users::update_user(&state.db, user.theater_id, id, &update).await?;
    info!("User {} updated by {}", updated.username, user.username);
    Ok(Json(updated))
}

/// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    user.require(Permission::UsersManage)?;
    if id == user.id {
        return Err(ApiError::BadRequest("You cannot delete yourself".into()));
    }
    users::delete_user(&state.db, user.theater_id, id).await?;
    info!("User {} deleted by {}", id, user.username);
    Ok(StatusCode::NO_CONTENT)
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route(
            "/api/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}
