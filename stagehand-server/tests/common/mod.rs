//! Shared helpers for API integration tests
//!
//! Each test gets a fresh database in a temporary directory, one theater with
//! an ADMIN user, and an app built with [`build_router`].

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use stagehand_common::auth::{JwtKeys, Role};
use stagehand_common::config::TomlConfig;
use stagehand_common::db::{init_database, RuntimeSettings};
use stagehand_server::db::theaters::{create_theater_with_admin, TheaterInput};
use stagehand_server::db::users::NewUser;
use stagehand_server::storage::LocalAttachmentStore;
use stagehand_server::{build_router, AppState};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

pub const PASSWORD: &str = "curtain42call";

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    pub theater_id: i64,
    pub admin_id: i64,
    pub admin_token: String,
    pub dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(TomlConfig::default()).await
    }

    pub async fn with_config(config: TomlConfig) -> Self {
        let dir = TempDir::new().expect("Should create temp dir");
        let pool = init_database(&dir.path().join("stagehand.db"))
            .await
            .expect("Should initialize database");

        let (theater, admin_id) = create_theater_with_admin(
            &pool,
            &TheaterInput {
                name: "Drama Theater".into(),
                city: Some("Riga".into()),
            },
            &new_user("admin", Role::Admin),
        )
        .await
        .expect("Should create theater");

        let store = LocalAttachmentStore::new(dir.path().join("attachments"));
        let state = AppState::new(
            pool.clone(),
            JwtKeys::new("integration-test-secret", "stagehand"),
            RuntimeSettings::default(),
            Arc::new(store),
            &config,
        );

        let mut app = Self {
            app: build_router(state),
            pool,
            theater_id: theater.id,
            admin_id,
            admin_token: String::new(),
            dir,
        };
        app.admin_token = app.login("admin", PASSWORD).await;
        app
    }

    /// Send a request and return the raw response
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("Router should respond")
    }

    /// JSON request; returns status and parsed body (`Null` when empty)
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Should build request");

        let response = self.send(request).await;
        let status = response.status();
        (status, read_json(response).await)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, Some(token), None).await
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["access_token"]
            .as_str()
            .expect("access_token should be a string")
            .to_string()
    }

    /// Create a user in the admin's theater and log in as them
    pub async fn user_with_role(&self, username: &str, role: &str) -> (i64, String) {
        let (status, body) = self
            .post(
                "/api/users",
                &self.admin_token,
                json!({
                    "username": username,
                    "full_name": format!("{} user", role),
                    "password": PASSWORD,
                    "role": role,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "user creation failed: {}", body);
        let id = body["id"].as_i64().expect("id");
        (id, self.login(username, PASSWORD).await)
    }

    /// A second theater with its own admin; returns the admin's token
    pub async fn other_theater(&self) -> String {
        create_theater_with_admin(
            &self.pool,
            &TheaterInput {
                name: "Opera House".into(),
                city: None,
            },
            &new_user("other-admin", Role::Admin),
        )
        .await
        .expect("Should create second theater");
        self.login("other-admin", PASSWORD).await
    }

    pub async fn create_venue(&self, name: &str) -> i64 {
        let (status, body) = self
            .post(
                "/api/venues",
                &self.admin_token,
                json!({ "name": name, "venue_type": "MAIN_STAGE", "capacity": 500 }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "venue creation failed: {}", body);
        body["id"].as_i64().expect("id")
    }

    pub async fn create_item(&self, number: &str, quantity: i64) -> i64 {
        let (status, body) = self
            .post(
                "/api/inventory/items",
                &self.admin_token,
                json!({
                    "inventory_number": number,
                    "name": format!("Item {}", number),
                    "quantity": quantity,
                    "unit_cost": 10.0,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "item creation failed: {}", body);
        body["id"].as_i64().expect("id")
    }

    pub async fn create_performance(&self, title: &str) -> i64 {
        let (status, body) = self
            .post(
                "/api/performances",
                &self.admin_token,
                json!({ "title": title, "duration_minutes": 150, "age_rating": "12+" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "performance creation failed: {}", body);
        body["id"].as_i64().expect("id")
    }
}

pub fn new_user(username: &str, role: Role) -> NewUser {
    NewUser {
        username: username.into(),
        full_name: format!("{} account", username),
        email: None,
        password: PASSWORD.into(),
        role,
    }
}

pub async fn read_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("Should read body")
        .to_bytes()
        .to_vec()
}

pub async fn read_json(response: Response) -> Value {
    let bytes = read_bytes(response).await;
    if bytes.is_empty() {
        return Value::Null;
    }
    // Extractor rejections are plain text
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Error code of an API error body
pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}
