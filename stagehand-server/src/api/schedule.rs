//! Schedule: events, conflict checks and the calendar
//!
//! Create and update run the conflict check first. Overlaps are rejected with
//! 409 and the list of conflicting occurrences unless the request sets
//! `allow_conflicts`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stagehand_common::auth::Permission;
use stagehand_common::pagination::{Page, PageParams};
use tracing::{info, warn};

use super::CurrentUser;
use crate::db::schedule::{self, EventData, EventDetail, EventFilter, EventStatus};
use crate::services::scheduling::{
    self, CalendarEntry, CalendarQuery, Conflict, EventInput,
};
use crate::{ApiError, ApiResult, AppState};

/// Validate and conflict-check a payload; `existing` is set on update
async fn prepare_event(
    state: &AppState,
    user: &CurrentUser,
    input: &EventInput,
    existing: Option<&EventDetail>,
) -> ApiResult<EventData> {
    let data = scheduling::validate_event(&state.db, user.theater_id, &state.settings, input).await?;

    let (exclude, exceptions) = match existing {
        Some(event)
            if data.keeps_series(event.event.starts_at, event.event.recurrence_rule.as_deref()) =>
        {
            (Some(event.event.id), event.exceptions.as_slice())
        }
        Some(event) => (Some(event.event.id), &[][..]),
        None => (None, &[][..]),
    };

    let conflicts = scheduling::detect_conflicts(
        &state.db,
        user.theater_id,
        &state.settings,
        &data,
        exclude,
        exceptions,
    )
    .await?;

    if !conflicts.is_empty() {
        if input.allow_conflicts {
            warn!(
                "Saving '{}' with {} conflict(s), forced by {}",
                data.title,
                conflicts.len(),
                user.username
            );
        } else {
            info!(
                "Rejected '{}' for {}: {} conflict(s)",
                data.title,
                user.username,
                conflicts.len()
            );
            return Err(ApiError::ScheduleConflict(conflicts));
        }
    }

    Ok(data)
}

pub async fn list_events(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(page): Query<PageParams>,
    Query(filter): Query<EventFilter>,
) -> ApiResult<Json<Page<EventDetail>>> {
    user.require(Permission::ScheduleRead)?;
    Ok(Json(schedule::list_events(&state.db, user.theater_id, &filter, page).await?))
}

/// POST /api/schedule/events
pub async fn create_event(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<EventInput>,
) -> ApiResult<(StatusCode, Json<EventDetail>)> {
    user.require(Permission::ScheduleWrite)?;
    let data = prepare_event(&state, &user, &input, None).await?;

    let id = schedule::insert_event(&state.db, user.theater_id, user.id, &data).await?;
    info!("Event {} '{}' created by {}", id, data.title, user.username);

    let event = schedule::get_event(&state.db, user.theater_id, id).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn get_event(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<EventDetail>> {
    user.require(Permission::ScheduleRead)?;
    Ok(Json(schedule::get_event(&state.db, user.theater_id, id).await?))
}

/// PUT /api/schedule/events/:id
pub async fn update_event(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(input): Json<EventInput>,
) -> ApiResult<Json<EventDetail>> {
    user.require(Permission::ScheduleWrite)?;

    let existing = schedule::get_event(&state.db, user.theater_id, id).await?;
    if existing.event.status == EventStatus::Cancelled {
        return Err(ApiError::Conflict(format!("Event {} is cancelled", id)));
    }

    let data = prepare_event(&state, &user, &input, Some(&existing)).await?;
    schedule::update_event(&state.db, user.theater_id, id, &data).await?;
    info!("Event {} updated by {}", id, user.username);

    Ok(Json(schedule::get_event(&state.db, user.theater_id, id).await?))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    user.require(Permission::ScheduleWrite)?;
    schedule::delete_event(&state.db, user.theater_id, id).await?;
    info!("Event {} deleted by {}", id, user.username);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/schedule/events/:id/cancel
pub async fn cancel_event(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<EventDetail>> {
    user.require(Permission::ScheduleWrite)?;

    let existing = schedule::get_event(&state.db, user.theater_id, id).await?;
    if existing.event.status == EventStatus::Cancelled {
        return Err(ApiError::Conflict(format!("Event {} is already cancelled", id)));
    }

    schedule::set_status(&state.db, user.theater_id, id, EventStatus::Cancelled).await?;
    info!("Event {} cancelled by {}", id, user.username);

    Ok(Json(schedule::get_event(&state.db, user.theater_id, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ExceptionRequest {
    pub occurrence_start: DateTime<Utc>,
}

/// POST /api/schedule/events/:id/exceptions
///
/// Skips one occurrence of a recurring event.
pub async fn add_exception(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<ExceptionRequest>,
) -> ApiResult<Json<EventDetail>> {
    user.require(Permission::ScheduleWrite)?;

    let event = schedule::get_event(&state.db, user.theater_id, id).await?;
    let occurrence_start = scheduling::check_exception(&event, req.occurrence_start)?;
    schedule::add_exception(&state.db, id, occurrence_start).await?;
    info!(
        "Event {}: occurrence {} skipped by {}",
        id,
        occurrence_start.to_rfc3339(),
        user.username
    );

    Ok(Json(schedule::get_event(&state.db, user.theater_id, id).await?))
}

#[derive(Debug, Serialize)]
pub struct ConflictReport {
    pub conflicts: Vec<Conflict>,
}

/// POST /api/schedule/conflicts
///
/// Dry run with the create payload; never writes.
pub async fn check_conflicts(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<EventInput>,
) -> ApiResult<Json<ConflictReport>> {
    user.require(Permission::ScheduleRead)?;
    let data = scheduling::validate_event(&state.db, user.theater_id, &state.settings, &input).await?;
    let conflicts = scheduling::detect_conflicts(
        &state.db,
        user.theater_id,
        &state.settings,
        &data,
        None,
        &[],
    )
    .await?;
    Ok(Json(ConflictReport { conflicts }))
}

/// GET /api/schedule/calendar?from=&to=
pub async fn calendar(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<CalendarQuery>,
) -> ApiResult<Json<Vec<CalendarEntry>>> {
    user.require(Permission::ScheduleRead)?;
    Ok(Json(
        scheduling::calendar(&state.db, user.theater_id, &state.settings, &query).await?,
    ))
}

pub fn schedule_routes() -> Router<AppState> {
    Router::new()
        .route("/api/schedule/events", get(list_events).post(create_event))
        .route(
            "/api/schedule/events/:id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/api/schedule/events/:id/cancel", post(cancel_event))
        .route("/api/schedule/events/:id/exceptions", post(add_exception))
        .route("/api/schedule/conflicts", post(check_conflicts))
        .route("/api/schedule/calendar", get(calendar))
}
