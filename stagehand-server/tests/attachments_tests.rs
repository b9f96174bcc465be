//! Integration tests for attachment upload, download and deletion

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{error_code, read_bytes, read_json, TestApp};
use serde_json::{json, Value};
use stagehand_common::config::TomlConfig;

const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

async fn upload(
    t: &TestApp,
    token: &str,
    query: &str,
    content_type: &str,
    body: Vec<u8>,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/attachments?{}", query))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();
    let response = t.send(request).await;
    let status = response.status();
    (status, read_json(response).await)
}

async fn create_document(t: &TestApp) -> i64 {
    let (status, body) = t
        .post(
            "/api/documents",
            &t.admin_token,
            json!({ "title": "Stage plot", "doc_type": "TECHNICAL_RIDER" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_upload_list_download_delete() {
    let t = TestApp::new().await;
    let doc = create_document(&t).await;

    let (status, attachment) = upload(
        &t,
        &t.admin_token,
        &format!("owner_type=DOCUMENT&owner_id={}&file_name=..%2Fnotes.txt", doc),
        "text/plain",
        b"hello world".to_vec(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", attachment);
    assert_eq!(attachment["file_name"], "notes.txt");
    assert_eq!(attachment["size_bytes"], 11);
    assert_eq!(attachment["sha256"], HELLO_SHA256);
    assert_eq!(attachment["content_type"], "text/plain");
    assert!(attachment.get("storage_key").is_none());
    let id = attachment["id"].as_i64().unwrap();

    let (status, list) = t
        .get(
            &format!("/api/attachments?owner_type=DOCUMENT&owner_id={}", doc),
            &t.admin_token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let request = Request::builder()
        .uri(format!("/api/attachments/{}/content", id))
        .header(header::AUTHORIZATION, format!("Bearer {}", t.admin_token))
        .body(Body::empty())
        .unwrap();
    let response = t.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"notes.txt\""
    );
    assert_eq!(read_bytes(response).await, b"hello world");

    let (status, _) = t
        .delete(&format!("/api/attachments/{}", id), &t.admin_token)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = t
        .get(&format!("/api/attachments/{}", id), &t.admin_token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = t
        .get(
            &format!("/api/attachments?owner_type=DOCUMENT&owner_id={}", doc),
            &t.admin_token,
        )
        .await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_rejections() {
    let t = TestApp::new().await;
    let doc = create_document(&t).await;

    let (status, body) = upload(
        &t,
        &t.admin_token,
        &format!("owner_type=DOCUMENT&owner_id={}&file_name=empty.bin", doc),
        "application/octet-stream",
        Vec::new(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");

    let (status, _) = upload(
        &t,
        &t.admin_token,
        "owner_type=PERFORMANCE&owner_id=4242&file_name=poster.png",
        "image/png",
        vec![1, 2, 3],
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = upload(
        &t,
        &t.admin_token,
        &format!("owner_type=DOCUMENT&owner_id={}&file_name=...", doc),
        "text/plain",
        b"x".to_vec(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, viewer) = t.user_with_role("archivist", "VIEWER").await;
    let (status, _) = upload(
        &t,
        &viewer,
        &format!("owner_type=DOCUMENT&owner_id={}&file_name=a.txt", doc),
        "text/plain",
        b"x".to_vec(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let mut config = TomlConfig::default();
    config.server.max_body_bytes = 128;
    let t = TestApp::with_config(config).await;
    let item = t.create_item("SET-1", 1).await;

    let (status, body) = upload(
        &t,
        &t.admin_token,
        &format!("owner_type=INVENTORY_ITEM&owner_id={}&file_name=photo.jpg", item),
        "image/jpeg",
        vec![0u8; 200],
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(error_code(&body), "PAYLOAD_TOO_LARGE");

    let (status, _) = upload(
        &t,
        &t.admin_token,
        &format!("owner_type=INVENTORY_ITEM&owner_id={}&file_name=photo.jpg", item),
        "image/jpeg",
        vec![0u8; 128],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}
