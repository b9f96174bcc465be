//! Authentication: bearer token middleware, login and token refresh
//!
//! Access tokens authenticate every `/api` call except login and refresh.
//! The middleware reloads the user on each request so deactivation and role
//! changes take effect before the token expires.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use stagehand_common::auth::{spawn_verify_password, Permission, Role, TokenKind};
use tracing::{debug, info, warn};

use crate::db::users::{self, User};
use crate::{ApiError, ApiResult, AppState};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Authenticated caller, inserted into request extensions
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub theater_id: i64,
    pub role: Role,
    pub username: String,
}

impl CurrentUser {
    /// 403 unless the caller's role grants `permission`
    pub fn require(&self, permission: Permission) -> ApiResult<()> {
        if self.role.has(permission) {
            Ok(())
        } else {
            debug!(
                "User {} ({}) lacks permission {:?}",
                self.username,
                self.role.as_str(),
                permission
            );
            Err(ApiError::Forbidden(format!(
                "Role {} is not allowed to perform this action",
                self.role.as_str()
            )))
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Authentication middleware
///
/// Returns 401 when the token is missing, invalid, expired, of the wrong
/// kind, or when its user is no longer active.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".into()))?;

    let claims = state.jwt.verify(&token, TokenKind::Access)?;

    let user = users::find_by_id(&state.db, claims.sub)
        .await?
        .filter(|u| u.is_active && u.theater_id == claims.theater_id)
        .ok_or_else(|| ApiError::Unauthorized("User is not active".into()))?;

    request.extensions_mut().insert(CurrentUser {
        id: user.id,
        theater_id: user.theater_id,
        role: user.role,
        username: user.username,
    });

    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

fn issue_tokens(state: &AppState, user_id: i64, theater_id: i64, role: Role) -> ApiResult<TokenResponse> {
    let access_token = state
        .jwt
        .issue(user_id, theater_id, role, TokenKind::Access, state.access_ttl)?;
    let refresh_token = state
        .jwt
        .issue(user_id, theater_id, role, TokenKind::Refresh, state.refresh_ttl)?;

    Ok(TokenResponse {
        access_token,
        refresh_token,
        token_type: "Bearer",
        expires_in: state.access_ttl.num_seconds(),
    })
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let record = users::find_by_username(&state.db, req.username.trim()).await?;

    let verified = match &record {
        Some(user) if user.is_active => {
            spawn_verify_password(req.password.clone(), user.password_hash.clone()).await
        }
        _ => false,
    };

    let user = match record {
        Some(user) if verified => user,
        _ => {
            warn!("Failed login for '{}'", req.username.trim());
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()));
        }
    };

    users::touch_last_login(&state.db, user.id).await?;
    info!("User {} logged in (theater {})", user.username, user.theater_id);

    Ok(Json(issue_tokens(&state, user.id, user.theater_id, user.role)?))
}

/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let claims = state.jwt.verify(&req.refresh_token, TokenKind::Refresh)?;

    let user = users::find_by_id(&state.db, claims.sub)
        .await?
        .filter(|u| u.is_active && u.theater_id == claims.theater_id)
        .ok_or_else(|| ApiError::Unauthorized("User is not active".into()))?;

    debug!("Refreshed tokens for user {}", user.id);
    Ok(Json(issue_tokens(&state, user.id, user.theater_id, user.role)?))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<User>> {
    Ok(Json(users::get_user(&state.db, user.theater_id, user.id).await?))
}

/// POST /api/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    let record = users::find_by_id(&state.db, user.id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User is not active".into()))?;

    if !spawn_verify_password(req.current_password, record.password_hash).await {
        warn!("Wrong current password from user {}", user.id);
        return Err(ApiError::BadRequest("Current password is incorrect".into()));
    }

    users::set_password(&state.db, user.id, &req.new_password).await?;
    info!("User {} changed their password", user.id);
    Ok(StatusCode::NO_CONTENT)
}

/// Login and refresh, no authentication required
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
}

/// Routes for the logged-in user
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/me", get(me))
        .route("/api/auth/change-password", post(change_password))
}
