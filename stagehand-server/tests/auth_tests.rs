//! Integration tests for authentication, users and permissions

mod common;

use axum::http::{Method, StatusCode};
use common::{error_code, TestApp, PASSWORD};
use serde_json::json;

// =============================================================================
// Health and login
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let t = TestApp::new().await;

    let (status, body) = t.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "stagehand");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_api_requires_bearer_token() {
    let t = TestApp::new().await;

    let (status, body) = t.call(Method::GET, "/api/venues", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "UNAUTHORIZED");

    let (status, _) = t.get("/api/venues", "not-a-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_failures_share_one_message() {
    let t = TestApp::new().await;

    let (status, wrong_password) = t
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "admin", "password": "nope12345" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, unknown_user) = t
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "ghost", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        wrong_password["error"]["message"],
        unknown_user["error"]["message"]
    );
}

#[tokio::test]
async fn test_login_returns_token_pair() {
    let t = TestApp::new().await;

    let (status, body) = t
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "admin", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 3600);
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());

    let (status, me) = t.get("/api/auth/me", &t.admin_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "admin");
    assert_eq!(me["role"], "ADMIN");
    assert!(me.get("password_hash").is_none());
    assert!(me["last_login_at"].is_string());
}

#[tokio::test]
async fn test_refresh_accepts_only_refresh_tokens() {
    let t = TestApp::new().await;

    let (_, pair) = t
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "admin", "password": PASSWORD })),
        )
        .await;
    let access = pair["access_token"].as_str().unwrap();
    let refresh = pair["refresh_token"].as_str().unwrap();

    let (status, renewed) = t
        .call(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(renewed["access_token"].is_string());

    // An access token is not a refresh token
    let (status, _) = t
        .call(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({ "refresh_token": access })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // ... and a refresh token does not authenticate API calls
    let (status, _) = t.get("/api/auth/me", refresh).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password() {
    let t = TestApp::new().await;
    let (_, token) = t.user_with_role("stage.manager", "STAFF").await;

    let (status, _) = t
        .post(
            "/api/auth/change-password",
            &token,
            json!({ "current_password": "wrong-pass1", "new_password": "newpass123" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .post(
            "/api/auth/change-password",
            &token,
            json!({ "current_password": PASSWORD, "new_password": "short" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .post(
            "/api/auth/change-password",
            &token,
            json!({ "current_password": PASSWORD, "new_password": "newpass123" }),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    t.login("stage.manager", "newpass123").await;
}

// =============================================================================
// Users and permissions
// =============================================================================

#[tokio::test]
async fn test_viewer_can_read_but_not_write() {
    let t = TestApp::new().await;
    let (_, viewer) = t.user_with_role("viewer1", "VIEWER").await;

    let (status, _) = t.get("/api/venues", &viewer).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = t
        .post(
            "/api/venues",
            &viewer,
            json!({ "name": "Studio", "venue_type": "SMALL_STAGE" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "FORBIDDEN");

    let (status, _) = t.get("/api/users", &viewer).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.get("/api/analytics/inventory", &viewer).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_users_cannot_remove_themselves() {
    let t = TestApp::new().await;
    let uri = format!("/api/users/{}", t.admin_id);

    let (status, _) = t.delete(&uri, &t.admin_token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t.put(&uri, &t.admin_token, json!({ "is_active": false })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deactivated_user_loses_access() {
    let t = TestApp::new().await;
    let (id, token) = t.user_with_role("temp.staff", "STAFF").await;

    let (status, _) = t
        .put(
            &format!("/api/users/{}", id),
            &t.admin_token,
            json!({ "is_active": false }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t.get("/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "temp.staff", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_list_filters_and_duplicates() {
    let t = TestApp::new().await;
    t.user_with_role("props.one", "STAFF").await;
    t.user_with_role("props.two", "STAFF").await;
    t.user_with_role("boss", "MANAGER").await;

    let (status, page) = t.get("/api/users?role=STAFF", &t.admin_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);

    let (_, page) = t.get("/api/users?search=boss", &t.admin_token).await;
    assert_eq!(page["total"], 1);

    let (_, page) = t.get("/api/users?page=2&page_size=2", &t.admin_token).await;
    assert_eq!(page["total"], 4);
    assert_eq!(page["page"], 2);
    assert_eq!(page["total_pages"], 2);

    let (status, body) = t
        .post(
            "/api/users",
            &t.admin_token,
            json!({
                "username": "boss",
                "full_name": "Another boss",
                "password": PASSWORD,
                "role": "VIEWER",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "CONFLICT");
}

#[tokio::test]
async fn test_other_theater_rows_are_not_found() {
    let t = TestApp::new().await;
    let venue_id = t.create_venue("Main Stage").await;
    let other = t.other_theater().await;

    let (status, _) = t.get(&format!("/api/venues/{}", venue_id), &other).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, page) = t.get("/api/venues", &other).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 0);

    let (status, theater) = t.get("/api/theater", &other).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(theater["name"], "Opera House");
}
