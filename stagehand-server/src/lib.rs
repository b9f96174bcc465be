//! Stagehand server library
//!
//! HTTP API for the theatre back office: inventory, documents, performance
//! passports, scheduling and analytics. Every `/api` route except login and
//! refresh requires a bearer access token; all data is scoped to the caller's
//! theater.

use axum::extract::DefaultBodyLimit;
use axum::{middleware, Router};
use chrono::Duration;
use sqlx::SqlitePool;
use stagehand_common::auth::JwtKeys;
use stagehand_common::config::TomlConfig;
use stagehand_common::db::RuntimeSettings;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod services;
pub mod storage;

pub use error::{ApiError, ApiResult};

use storage::AttachmentStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Token signing and verification
    pub jwt: JwtKeys,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Scheduling limits from the `settings` table
    pub settings: RuntimeSettings,
    /// Attachment blob storage
    pub store: Arc<dyn AttachmentStore>,
    /// Upper bound for request bodies
    pub max_body_bytes: usize,
}

impl AppState {
    /// Create new application state; lifetimes and limits come from `config`
    pub fn new(
        db: SqlitePool,
        jwt: JwtKeys,
        settings: RuntimeSettings,
        store: Arc<dyn AttachmentStore>,
        config: &TomlConfig,
    ) -> Self {
        Self {
            db,
            jwt,
            access_ttl: Duration::minutes(config.auth.access_ttl_minutes),
            refresh_ttl: Duration::days(config.auth.refresh_ttl_days),
            settings,
            store,
            max_body_bytes: config.server.max_body_bytes,
        }
    }
}

/// Build application router
///
/// `/health`, login and refresh are public; everything else goes through
/// [`api::auth_middleware`].
pub fn build_router(state: AppState) -> Router {
    // Protected routes (require a valid access token)
    let protected = Router::new()
        .merge(api::session_routes())
        .merge(api::theater_routes())
        .merge(api::user_routes())
        .merge(api::venue_routes())
        .merge(api::department_routes())
        .merge(api::inventory_routes())
        .merge(api::document_routes())
        .merge(api::attachment_routes())
        .merge(api::performance_routes())
        .merge(api::schedule_routes())
        .merge(api::analytics_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .merge(api::health_routes())
        .merge(api::auth_routes());

    let max_body_bytes = state.max_body_bytes;

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        // Browser clients authenticate with bearer tokens, never cookies
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
