//! Venues: stages, rehearsal rooms, workshops and warehouses

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
use crate::db::venues::{self, Venue, VenueFilter, VenueInput};
use crate::{ApiResult, AppState};

pub async fn list_venues(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(page): Query<PageParams>,
    Query(filter): Query<VenueFilter>,
) -> ApiResult<Json<Page<Venue>>> {
    Ok(Json(venues::list_venues(&state.db, user.theater_id, &filter, page).await?))
}

pub async fn create_venue(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<VenueInput>,
) -> ApiResult<(StatusCode, Json<Venue>)> {
    user.require(Permission::VenuesWrite)?;
    let venue = venues::create_venue(&state.db, user.theater_id, &input).await?;
    info!("Venue {} '{}' created by {}", venue.id, venue.name, user.username);
    Ok((StatusCode::CREATED, Json(venue)))
}

pub async fn get_venue(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Venue>> {
    Ok(Json(venues::get_venue(&state.db, user.theater_id, id).await?))
}

pub async fn update_venue(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(input): Json<VenueInput>,
) -> ApiResult<Json<Venue>> {
    user.require(Permission::VenuesWrite)?;
    Ok(Json(venues::update_venue(&state.db, user.theater_id, id, &input).await?))
}

pub async fn delete_venue(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    user.require(Permission::VenuesWrite)?;
    venues::delete_venue(&state.db, user.theater_id, id).await?;
    info!("Venue {} deleted by {}", id, user.username);
    Ok(StatusCode::NO_CONTENT)
}

pub fn venue_routes() -> Router<AppState> {
    Router::new()
        .route("/api/venues", get(list_venues).post(create_venue))
        .route(
            "/api/venues/:id",
            get(get_venue).put(update_venue).delete(delete_venue),
        )
}
