//! Documents and their approval workflow

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use stagehand_common::auth::Permission;
use stagehand_common::pagination::{Page, PageParams};
use tracing::info;

use super::CurrentUser;
use crate::db::documents::{self, Document, DocumentFilter, DocumentInput, HistoryEntry};
use crate::services::workflow::DocumentAction;
use crate::{ApiResult, AppState};

pub async fn list_documents(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(page): Query<PageParams>,
    Query(filter): Query<DocumentFilter>,
) -> ApiResult<Json<Page<Document>>> {
    user.require(Permission::DocumentsRead)?;
    Ok(Json(
        documents::list_documents(&state.db, user.theater_id, &filter, page).await?,
    ))
}

pub async fn create_document(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<DocumentInput>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    user.require(Permission::DocumentsWrite)?;
    let document = documents::create_document(&state.db, user.theater_id, user.id, &input).await?;
    info!("Document {} created by {}", document.id, user.username);
    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn get_document(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Document>> {
    user.require(Permission::DocumentsRead)?;
    Ok(Json(documents::get_document(&state.db, user.theater_id, id).await?))
}

pub async fn update_document(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(input): Json<DocumentInput>,
) -> ApiResult<Json<Document>> {
    user.require(Permission::DocumentsWrite)?;
    Ok(Json(
        documents::update_document(&state.db, user.theater_id, id, &input).await?,
    ))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    user.require(Permission::DocumentsWrite)?;
    documents::delete_document(&state.db, user.theater_id, id).await?;
    info!("Document {} deleted by {}", id, user.username);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub action: DocumentAction,
    pub comment: Option<String>,
}

/// POST /api/documents/:id/transitions
///
/// approve and reject need `DocumentsApprove`; the other actions need
/// `DocumentsWrite`.
pub async fn transition_document(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<TransitionRequest>,
) -> ApiResult<Json<Document>> {
    if req.action.is_review() {
        user.require(Permission::DocumentsApprove)?;
    } else {
        user.require(Permission::DocumentsWrite)?;
    }

    let document = documents::transition_document(
        &state.db,
        user.theater_id,
        id,
        user.id,
        req.action,
        req.comment.as_deref(),
    )
    .await?;
    Ok(Json(document))
}

pub async fn document_history(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    user.require(Permission::DocumentsRead)?;
    Ok(Json(documents::document_history(&state.db, user.theater_id, id).await?))
}

pub fn document_routes() -> Router<AppState> {
    Router::new()
        .route("/api/documents", get(list_documents).post(create_document))
        .route(
            "/api/documents/:id",
            get(get_document).put(update_document).delete(delete_document),
        )
        .route("/api/documents/:id/transitions", post(transition_document))
        .route("/api/documents/:id/history", get(document_history))
}
