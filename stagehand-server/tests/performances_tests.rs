//! Integration tests for performance passports and readiness

mod common;

use axum::http::StatusCode;
use common::{error_code, TestApp};
use serde_json::json;

#[tokio::test]
async fn test_create_and_update_passport() {
    let t = TestApp::new().await;
    let id = t.create_performance("The Seagull").await;
    let uri = format!("/api/performances/{}", id);

    let (status, perf) = t.get(&uri, &t.admin_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(perf["status"], "PREPARATION");
    assert_eq!(perf["age_rating"], "12+");
    assert_eq!(perf["intermissions"], 0);

    let (status, perf) = t
        .put(
            &uri,
            &t.admin_token,
            json!({
                "title": "The Seagull",
                "author": "Anton Chekhov",
                "genre": "comedy",
                "duration_minutes": 165,
                "intermissions": 1,
                "premiere_date": "2030-10-01",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(perf["author"], "Anton Chekhov");
    assert_eq!(perf["premiere_date"], "2030-10-01");
    assert!(perf["age_rating"].is_null());

    let (status, _) = t
        .put(&uri, &t.admin_token, json!({ "title": "X", "duration_minutes": 0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .post(
            "/api/performances",
            &t.admin_token,
            json!({ "title": "Bad", "age_rating": "21+" }),
        )
        .await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_status_lifecycle_requires_premiere() {
    let t = TestApp::new().await;
    let id = t.create_performance("Three Sisters").await;
    let status_uri = format!("/api/performances/{}/status", id);

    let (status, body) = t
        .post(&status_uri, &t.admin_token, json!({ "status": "IN_REPERTOIRE" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");

    let (status, _) = t
        .post(&status_uri, &t.admin_token, json!({ "status": "PAUSED" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    t.put(
        &format!("/api/performances/{}", id),
        &t.admin_token,
        json!({ "title": "Three Sisters", "premiere_date": "2030-03-15" }),
    )
    .await;

    let (status, perf) = t
        .post(&status_uri, &t.admin_token, json!({ "status": "IN_REPERTOIRE" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(perf["status"], "IN_REPERTOIRE");

    // On stage: premiere cannot be cleared and the passport cannot be deleted
    let (status, _) = t
        .put(
            &format!("/api/performances/{}", id),
            &t.admin_token,
            json!({ "title": "Three Sisters" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = t
        .delete(&format!("/api/performances/{}", id), &t.admin_token)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, perf) = t
        .post(&status_uri, &t.admin_token, json!({ "status": "ARCHIVED" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(perf["status"], "ARCHIVED");

    let (status, _) = t
        .put(
            &format!("/api/performances/{}", id),
            &t.admin_token,
            json!({ "title": "Three Sisters", "premiere_date": "2030-03-15" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, page) = t
        .get("/api/performances?status=ARCHIVED", &t.admin_token)
        .await;
    assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn test_staff_assignments() {
    let t = TestApp::new().await;
    let (actor_id, _) = t.user_with_role("nina", "STAFF").await;
    let id = t.create_performance("The Seagull").await;
    let staff_uri = format!("/api/performances/{}/staff", id);

    let (status, member) = t
        .post(
            &staff_uri,
            &t.admin_token,
            json!({ "user_id": actor_id, "kind": "CAST", "role_name": "Nina Zarechnaya" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(member["person_name"], "STAFF user");
    let member_id = member["id"].as_i64().unwrap();

    let (status, _) = t
        .post(
            &staff_uri,
            &t.admin_token,
            json!({ "person_name": "Guest Designer", "kind": "CREATIVE", "role_name": "Set design" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = t
        .post(&staff_uri, &t.admin_token, json!({ "kind": "CREW", "role_name": "Sound" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, list) = t.get(&staff_uri, &t.admin_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 2);

    let (status, _) = t
        .delete(&format!("{}/{}", staff_uri, member_id), &t.admin_token)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = t
        .delete(&format!("{}/{}", staff_uri, member_id), &t.admin_token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_readiness_tracks_tasks_and_items() {
    let t = TestApp::new().await;
    let id = t.create_performance("Uncle Vanya").await;
    let item = t.create_item("PRP-77", 2).await;
    let readiness_uri = format!("/api/performances/{}/readiness", id);

    let (status, readiness) = t.get(&readiness_uri, &t.admin_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["percent"], 0);
    assert_eq!(readiness["is_ready"], false);

    let (status, required) = t
        .put(
            &format!("/api/performances/{}/items/{}", id, item),
            &t.admin_token,
            json!({ "quantity": 3, "note": "Samovars" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(required["stock_quantity"], 2);
    assert_eq!(required["quantity"], 3);

    let (status, task) = t
        .post(
            &format!("/api/performances/{}/tasks", id),
            &t.admin_token,
            json!({ "title": "Dress rehearsal", "due_date": "2000-01-01" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(task["is_done"], false);
    let task_id = task["id"].as_i64().unwrap();

    let (_, readiness) = t.get(&readiness_uri, &t.admin_token).await;
    assert_eq!(readiness["tasks_total"], 1);
    assert_eq!(readiness["overdue_tasks"], 1);
    assert_eq!(readiness["items_ready"], 0);
    assert_eq!(readiness["missing_items"][0]["required"], 3);
    assert_eq!(readiness["missing_items"][0]["available"], 2);
    assert_eq!(readiness["percent"], 0);

    t.post(
        &format!("/api/inventory/items/{}/movements", item),
        &t.admin_token,
        json!({ "movement_type": "RECEIPT", "quantity": 1 }),
    )
    .await;

    let (_, readiness) = t.get(&readiness_uri, &t.admin_token).await;
    assert_eq!(readiness["percent"], 50);

    let (status, task) = t
        .put(
            &format!("/api/performances/{}/tasks/{}", id, task_id),
            &t.admin_token,
            json!({ "is_done": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["is_done"], true);
    assert!(task["done_at"].is_string());

    let (_, readiness) = t.get(&readiness_uri, &t.admin_token).await;
    assert_eq!(readiness["percent"], 100);
    assert_eq!(readiness["is_ready"], true);
    assert_eq!(readiness["overdue_tasks"], 0);
    assert!(readiness["missing_items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_required_items_reject_written_off_stock() {
    let t = TestApp::new().await;
    let id = t.create_performance("Ivanov").await;
    let item = t.create_item("OLD-1", 1).await;

    t.post(
        &format!("/api/inventory/items/{}/movements", item),
        &t.admin_token,
        json!({ "movement_type": "WRITE_OFF" }),
    )
    .await;

    let uri = format!("/api/performances/{}/items/{}", id, item);
    let (status, _) = t.put(&uri, &t.admin_token, json!({ "quantity": 1 })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = t.delete(&uri, &t.admin_token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleted_inventory_item_keeps_passport_unready() {
    let t = TestApp::new().await;
    let id = t.create_performance("The Cherry Orchard").await;
    let item = t.create_item("AXE-1", 1).await;
    let readiness_uri = format!("/api/performances/{}/readiness", id);

    let (status, _) = t
        .put(
            &format!("/api/performances/{}/items/{}", id, item),
            &t.admin_token,
            json!({ "quantity": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, task) = t
        .post(
            &format!("/api/performances/{}/tasks", id),
            &t.admin_token,
            json!({ "title": "Tune the breaking string" }),
        )
        .await;
    t.put(
        &format!("/api/performances/{}/tasks/{}", id, task["id"]),
        &t.admin_token,
        json!({ "is_done": true }),
    )
    .await;

    let (status, _) = t
        .delete(&format!("/api/inventory/items/{}", item), &t.admin_token)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, readiness) = t.get(&readiness_uri, &t.admin_token).await;
    assert_eq!(readiness["items_total"], 1);
    assert_eq!(readiness["items_ready"], 0);
    assert_eq!(readiness["percent"], 50);
    assert_eq!(readiness["is_ready"], false);
    assert_eq!(readiness["missing_items"][0]["is_deleted"], true);
    assert_eq!(readiness["missing_items"][0]["available"], 0);

    // Dropping the dangling requirement makes the passport ready again
    let (status, _) = t
        .delete(
            &format!("/api/performances/{}/items/{}", id, item),
            &t.admin_token,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, readiness) = t.get(&readiness_uri, &t.admin_token).await;
    assert_eq!(readiness["items_total"], 0);
    assert_eq!(readiness["percent"], 100);
    assert_eq!(readiness["is_ready"], true);
}
