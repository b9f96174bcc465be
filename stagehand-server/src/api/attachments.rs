//! File attachments for documents, performances and inventory items
//!
//! Uploads are raw request bodies; owner and file name travel in the query
//! string and the media type in `Content-Type`. Access follows the owner's
//! module permissions.

use axum::{
    body::{to_bytes, Body},
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use http_body_util::LengthLimitError;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use super::CurrentUser;
use crate::db::attachments::{self, Attachment, NewAttachment, OwnerType};
use crate::{ApiError, ApiResult, AppState};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub owner_type: OwnerType,
    pub owner_id: i64,
    pub file_name: String,
}

#[derive(Debug, Deserialize)]
pub struct OwnerParams {
    pub owner_type: OwnerType,
    pub owner_id: i64,
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

/// `Content-Disposition` value; non-ASCII and quote characters become `_`
fn content_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

/// 413 when the body hit the size limit, 400 for any other read failure
fn body_error(err: &axum::Error, limit: usize) -> ApiError {
    let mut source = Some(err as &(dyn std::error::Error + 'static));
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return ApiError::PayloadTooLarge(format!("Attachments are limited to {} bytes", limit));
        }
        source = e.source();
    }
    ApiError::BadRequest(format!("Failed to read attachment body: {}", err))
}

/// POST /api/attachments?owner_type=&owner_id=&file_name=
pub async fn upload_attachment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<(StatusCode, Json<Attachment>)> {
    user.require(params.owner_type.write_permission())?;
    attachments::ensure_owner(&state.db, user.theater_id, params.owner_type, params.owner_id)
        .await?;
    let file_name = attachments::sanitize_file_name(&params.file_name)?;

    let bytes = to_bytes(body, state.max_body_bytes).await.map_err(|e| {
        warn!("Upload from {} rejected: {}", user.username, e);
        body_error(&e, state.max_body_bytes)
    })?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Attachment body is empty".into()));
    }

    let sha256 = hex::encode(Sha256::digest(&bytes));
    let storage_key = Uuid::new_v4().to_string();
    state.store.put(&storage_key, &bytes).await?;

    let new = NewAttachment {
        owner_type: params.owner_type,
        owner_id: params.owner_id,
        file_name,
        content_type: content_type(&headers),
        size_bytes: bytes.len() as i64,
        sha256,
        storage_key: storage_key.clone(),
        uploaded_by: user.id,
    };

    let attachment = match attachments::insert_attachment(&state.db, user.theater_id, &new).await {
        Ok(attachment) => attachment,
        Err(e) => {
            if let Err(cleanup) = state.store.delete(&storage_key).await {
                warn!("Failed to remove orphaned blob {}: {}", storage_key, cleanup);
            }
            return Err(e.into());
        }
    };

    info!(
        "Attachment {} '{}' ({} bytes) uploaded to {:?} {} by {}",
        attachment.id,
        attachment.file_name,
        attachment.size_bytes,
        attachment.owner_type,
        attachment.owner_id,
        user.username
    );
    Ok((StatusCode::CREATED, Json(attachment)))
}

/// GET /api/attachments?owner_type=&owner_id=
pub async fn list_attachments(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<OwnerParams>,
) -> ApiResult<Json<Vec<Attachment>>> {
    user.require(params.owner_type.read_permission())?;
    attachments::ensure_owner(&state.db, user.theater_id, params.owner_type, params.owner_id)
        .await?;
    Ok(Json(
        attachments::list_attachments(&state.db, user.theater_id, params.owner_type, params.owner_id)
            .await?,
    ))
}

pub async fn get_attachment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Attachment>> {
    let attachment = attachments::get_attachment(&state.db, user.theater_id, id).await?;
    user.require(attachment.owner_type.read_permission())?;
    Ok(Json(attachment))
}

/// GET /api/attachments/:id/content
pub async fn download_attachment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let attachment = attachments::get_attachment(&state.db, user.theater_id, id).await?;
    user.require(attachment.owner_type.read_permission())?;

    let bytes = state.store.get(&attachment.storage_key).await?;
    Ok((
        [
            (header::CONTENT_TYPE, attachment.content_type.clone()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&attachment.file_name),
            ),
        ],
        bytes,
    ))
}

/// DELETE /api/attachments/:id
///
/// The row is soft deleted; the blob is removed.
pub async fn delete_attachment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let attachment = attachments::get_attachment(&state.db, user.theater_id, id).await?;
    user.require(attachment.owner_type.write_permission())?;

    attachments::delete_attachment(&state.db, user.theater_id, id).await?;
    if let Err(e) = state.store.delete(&attachment.storage_key).await {
        warn!("Attachment {} deleted but blob removal failed: {}", id, e);
    }

    info!("Attachment {} deleted by {}", id, user.username);
    Ok(StatusCode::NO_CONTENT)
}

pub fn attachment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/attachments",
            get(list_attachments).post(upload_attachment),
        )
        .route(
            "/api/attachments/:id",
            get(get_attachment).delete(delete_attachment),
        )
        .route("/api/attachments/:id/content", get(download_attachment))
}
