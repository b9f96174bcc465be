//! The caller's theater

use axum::{extract::State, routing::get, Extension, Json, Router};
use stagehand_common::auth::Permission;
use tracing::info;

use super::CurrentUser;
use crate::db::theaters::{self, Theater, TheaterInput};
use crate::{ApiResult, AppState};

/// GET /api/theater
pub async fn get_theater(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Theater>> {
    Ok(Json(theaters::get_theater(&state.db, user.theater_id).await?))
}

/// PUT /api/theater
pub async fn update_theater(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<TheaterInput>,
) -> ApiResult<Json<Theater>> {
    user.require(Permission::UsersManage)?;
    let theater = theaters::update_theater(&state.db, user.theater_id, &input).await?;
    info!("Theater {} renamed to '{}' by {}", theater.id, theater.name, user.username);
    Ok(Json(theater))
}

pub fn theater_routes() -> Router<AppState> {
    Router::new().route("/api/theater", get(get_theater).put(update_theater))
}
