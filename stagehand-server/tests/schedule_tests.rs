//! Integration tests for events, conflict detection and the calendar
//!
//! Dates are in 2030 so that events stay in the future.

mod common;

use axum::http::StatusCode;
use common::{error_code, TestApp};
use serde_json::{json, Value};

fn rehearsal(venue_id: i64, starts_at: &str, ends_at: &str) -> Value {
    json!({
        "title": "Rehearsal",
        "event_type": "REHEARSAL",
        "venue_id": venue_id,
        "starts_at": starts_at,
        "ends_at": ends_at,
    })
}

async fn create_event(t: &TestApp, body: Value) -> i64 {
    let (status, event) = t.post("/api/schedule/events", &t.admin_token, body).await;
    assert_eq!(status, StatusCode::CREATED, "event creation failed: {}", event);
    event["id"].as_i64().unwrap()
}

async fn calendar(t: &TestApp, query: &str) -> Vec<Value> {
    let (status, entries) = t
        .get(&format!("/api/schedule/calendar?{}", query), &t.admin_token)
        .await;
    assert_eq!(status, StatusCode::OK, "calendar failed: {}", entries);
    entries.as_array().cloned().unwrap_or_default()
}

#[tokio::test]
async fn test_venue_overlap_is_rejected() {
    let t = TestApp::new().await;
    let stage = t.create_venue("Main Stage").await;
    let first = create_event(&t, rehearsal(stage, "2030-03-04T18:00:00Z", "2030-03-04T21:00:00Z")).await;

    let (status, body) = t
        .post(
            "/api/schedule/events",
            &t.admin_token,
            rehearsal(stage, "2030-03-04T19:00:00Z", "2030-03-04T20:00:00Z"),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "SCHEDULE_CONFLICT");
    let conflicts = body["error"]["conflicts"].as_array().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0]["event_id"], first);
    assert_eq!(conflicts[0]["reason"], "VENUE");
    assert_eq!(conflicts[0]["occurrence_start"], "2030-03-04T18:00:00Z");

    // Touching intervals do not overlap
    create_event(&t, rehearsal(stage, "2030-03-04T21:00:00Z", "2030-03-04T22:00:00Z")).await;

    let mut forced = rehearsal(stage, "2030-03-04T19:00:00Z", "2030-03-04T20:00:00Z");
    forced["allow_conflicts"] = json!(true);
    create_event(&t, forced).await;

    let (_, page) = t.get("/api/schedule/events", &t.admin_token).await;
    assert_eq!(page["total"], 3);
}

#[tokio::test]
async fn test_dry_run_reports_without_writing() {
    let t = TestApp::new().await;
    let stage = t.create_venue("Main Stage").await;
    let other = t.create_venue("Small Stage").await;
    create_event(&t, rehearsal(stage, "2030-03-05T10:00:00Z", "2030-03-05T12:00:00Z")).await;

    let (status, report) = t
        .post(
            "/api/schedule/conflicts",
            &t.admin_token,
            rehearsal(stage, "2030-03-05T11:00:00Z", "2030-03-05T13:00:00Z"),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["conflicts"].as_array().unwrap().len(), 1);

    let (_, report) = t
        .post(
            "/api/schedule/conflicts",
            &t.admin_token,
            rehearsal(other, "2030-03-05T11:00:00Z", "2030-03-05T13:00:00Z"),
        )
        .await;
    assert!(report["conflicts"].as_array().unwrap().is_empty());

    let (_, page) = t.get("/api/schedule/events", &t.admin_token).await;
    assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn test_participant_double_booking() {
    let t = TestApp::new().await;
    let stage = t.create_venue("Main Stage").await;
    let studio = t.create_venue("Studio").await;
    let (actor, _) = t.user_with_role("lead.actor", "STAFF").await;

    let mut first = rehearsal(stage, "2030-03-06T10:00:00Z", "2030-03-06T14:00:00Z");
    first["participant_ids"] = json!([actor]);
    let first = create_event(&t, first).await;

    let mut second = rehearsal(studio, "2030-03-06T13:00:00Z", "2030-03-06T15:00:00Z");
    second["participant_ids"] = json!([actor]);
    let (status, body) = t.post("/api/schedule/events", &t.admin_token, second).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["conflicts"][0]["event_id"], first);
    assert_eq!(body["error"]["conflicts"][0]["reason"], "PARTICIPANT");
}

#[tokio::test]
async fn test_recurring_series_and_exceptions() {
    let t = TestApp::new().await;
    let stage = t.create_venue("Main Stage").await;

    let mut weekly = rehearsal(stage, "2030-03-04T10:00:00Z", "2030-03-04T13:00:00Z");
    weekly["recurrence_rule"] = json!("FREQ=WEEKLY;BYDAY=MO;COUNT=4");
    let series = create_event(&t, weekly).await;

    let entries = calendar(&t, "from=2030-03-01T00:00:00Z&to=2030-04-01T00:00:00Z").await;
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().all(|e| e["recurring"] == true));
    assert_eq!(entries[2]["start"], "2030-03-18T10:00:00Z");

    // Third Monday is taken by the series
    let single = rehearsal(stage, "2030-03-18T11:00:00Z", "2030-03-18T12:00:00Z");
    let (status, body) = t
        .post("/api/schedule/events", &t.admin_token, single.clone())
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["conflicts"][0]["occurrence_start"], "2030-03-18T10:00:00Z");

    let exceptions_uri = format!("/api/schedule/events/{}/exceptions", series);
    let (status, _) = t
        .post(
            &exceptions_uri,
            &t.admin_token,
            json!({ "occurrence_start": "2030-03-19T10:00:00Z" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, event) = t
        .post(
            &exceptions_uri,
            &t.admin_token,
            json!({ "occurrence_start": "2030-03-18T10:00:00Z" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(event["exceptions"][0], "2030-03-18T10:00:00Z");

    create_event(&t, single).await;

    let entries = calendar(&t, "from=2030-03-01T00:00:00Z&to=2030-04-01T00:00:00Z").await;
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[2]["start"], "2030-03-18T11:00:00Z");
    assert_eq!(entries[2]["recurring"], false);
}

#[tokio::test]
async fn test_moving_a_series_clears_its_exceptions() {
    let t = TestApp::new().await;
    let stage = t.create_venue("Main Stage").await;

    let mut weekly = rehearsal(stage, "2030-03-04T10:00:00Z", "2030-03-04T13:00:00Z");
    weekly["recurrence_rule"] = json!("FREQ=WEEKLY;BYDAY=MO;COUNT=4");
    let series = create_event(&t, weekly.clone()).await;
    let uri = format!("/api/schedule/events/{}", series);

    let (status, _) = t
        .post(
            &format!("{}/exceptions", uri),
            &t.admin_token,
            json!({ "occurrence_start": "2030-03-11T10:00:00Z" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Same series, new title: the skipped Monday stays skipped
    weekly["title"] = json!("Fight rehearsal");
    let (status, event) = t.put(&uri, &t.admin_token, weekly).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(event["exceptions"].as_array().unwrap().len(), 1);
    assert_eq!(
        calendar(&t, "from=2030-03-01T00:00:00Z&to=2030-04-01T00:00:00Z").await.len(),
        3
    );

    let mut tuesdays = rehearsal(stage, "2030-03-05T10:00:00Z", "2030-03-05T13:00:00Z");
    tuesdays["recurrence_rule"] = json!("FREQ=WEEKLY;BYDAY=TU;COUNT=4");
    let (status, event) = t.put(&uri, &t.admin_token, tuesdays).await;
    assert_eq!(status, StatusCode::OK);
    assert!(event["exceptions"].as_array().unwrap().is_empty());

    let entries = calendar(&t, "from=2030-03-01T00:00:00Z&to=2030-04-01T00:00:00Z").await;
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[1]["start"], "2030-03-12T10:00:00Z");
}

#[tokio::test]
async fn test_exception_on_single_event_is_rejected() {
    let t = TestApp::new().await;
    let stage = t.create_venue("Main Stage").await;
    let id = create_event(&t, rehearsal(stage, "2030-05-01T10:00:00Z", "2030-05-01T11:00:00Z")).await;

    let (status, _) = t
        .post(
            &format!("/api/schedule/events/{}/exceptions", id),
            &t.admin_token,
            json!({ "occurrence_start": "2030-05-01T10:00:00Z" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_does_not_conflict_with_itself() {
    let t = TestApp::new().await;
    let stage = t.create_venue("Main Stage").await;
    let id = create_event(&t, rehearsal(stage, "2030-03-07T10:00:00Z", "2030-03-07T12:00:00Z")).await;

    let mut moved = rehearsal(stage, "2030-03-07T11:00:00Z", "2030-03-07T13:00:00Z");
    moved["title"] = json!("Blocking rehearsal");
    let (status, event) = t
        .put(&format!("/api/schedule/events/{}", id), &t.admin_token, moved)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(event["title"], "Blocking rehearsal");
    assert_eq!(event["starts_at"], "2030-03-07T11:00:00Z");
}

#[tokio::test]
async fn test_cancelled_events() {
    let t = TestApp::new().await;
    let stage = t.create_venue("Main Stage").await;
    let id = create_event(&t, rehearsal(stage, "2030-03-08T10:00:00Z", "2030-03-08T12:00:00Z")).await;
    let cancel_uri = format!("/api/schedule/events/{}/cancel", id);

    let (status, event) = t.post(&cancel_uri, &t.admin_token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(event["status"], "CANCELLED");

    let (status, _) = t.post(&cancel_uri, &t.admin_token, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = t
        .put(
            &format!("/api/schedule/events/{}", id),
            &t.admin_token,
            rehearsal(stage, "2030-03-08T10:00:00Z", "2030-03-08T11:00:00Z"),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Freed slot
    create_event(&t, rehearsal(stage, "2030-03-08T10:00:00Z", "2030-03-08T12:00:00Z")).await;

    let window = "from=2030-03-08T00:00:00Z&to=2030-03-09T00:00:00Z";
    assert_eq!(calendar(&t, window).await.len(), 1);
    let all = calendar(&t, &format!("{}&include_cancelled=true", window)).await;
    assert_eq!(all.len(), 2);
    assert!(all.iter().any(|e| e["status"] == "CANCELLED"));
}

#[tokio::test]
async fn test_event_validation() {
    let t = TestApp::new().await;
    let stage = t.create_venue("Main Stage").await;

    let cases = [
        rehearsal(stage, "2030-03-09T12:00:00Z", "2030-03-09T10:00:00Z"),
        rehearsal(stage, "2030-03-09T10:00:00Z", "2030-03-09T10:00:00Z"),
        json!({
            "title": "Show",
            "event_type": "PERFORMANCE",
            "venue_id": stage,
            "starts_at": "2030-03-09T19:00:00Z",
            "ends_at": "2030-03-09T22:00:00Z",
        }),
        {
            let mut bad_rule = rehearsal(stage, "2030-03-09T10:00:00Z", "2030-03-09T11:00:00Z");
            bad_rule["recurrence_rule"] = json!("FREQ=HOURLY");
            bad_rule
        },
        {
            let mut cancelled = rehearsal(stage, "2030-03-09T10:00:00Z", "2030-03-09T11:00:00Z");
            cancelled["status"] = json!("CANCELLED");
            cancelled
        },
        rehearsal(9999, "2030-03-09T10:00:00Z", "2030-03-09T11:00:00Z"),
    ];

    for body in cases {
        let (status, response) = t
            .post("/api/schedule/events", &t.admin_token, body.clone())
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} -> {}", body, response);
    }

    let (status, _) = t
        .get(
            "/api/schedule/calendar?from=2030-03-09T00:00:00Z&to=2030-03-01T00:00:00Z",
            &t.admin_token,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_performance_event_and_calendar_filter() {
    let t = TestApp::new().await;
    let stage = t.create_venue("Main Stage").await;
    let perf = t.create_performance("The Cherry Orchard").await;

    create_event(
        &t,
        json!({
            "title": "The Cherry Orchard",
            "event_type": "PERFORMANCE",
            "venue_id": stage,
            "performance_id": perf,
            "starts_at": "2030-04-02T19:00:00Z",
            "ends_at": "2030-04-02T22:00:00Z",
        }),
    )
    .await;
    create_event(&t, rehearsal(stage, "2030-04-02T10:00:00Z", "2030-04-02T13:00:00Z")).await;

    let window = "from=2030-04-01T00:00:00Z&to=2030-04-03T00:00:00Z";
    assert_eq!(calendar(&t, window).await.len(), 2);

    let shows = calendar(&t, &format!("{}&performance_id={}", window, perf)).await;
    assert_eq!(shows.len(), 1);
    assert_eq!(shows[0]["event_type"], "PERFORMANCE");
}

#[tokio::test]
async fn test_venue_with_upcoming_events_cannot_be_deleted() {
    let t = TestApp::new().await;
    let stage = t.create_venue("Main Stage").await;
    let id = create_event(&t, rehearsal(stage, "2030-06-01T10:00:00Z", "2030-06-01T12:00:00Z")).await;
    let venue_uri = format!("/api/venues/{}", stage);

    let (status, body) = t.delete(&venue_uri, &t.admin_token).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "CONFLICT");

    t.post(
        &format!("/api/schedule/events/{}/cancel", id),
        &t.admin_token,
        json!({}),
    )
    .await;

    let (status, _) = t.delete(&venue_uri, &t.admin_token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_oversized_interval_is_rejected() {
    let t = TestApp::new().await;
    let stage = t.create_venue("Main Stage").await;

    for rule in ["FREQ=DAILY;INTERVAL=100000000;COUNT=2", "FREQ=WEEKLY;INTERVAL=4000000000;BYDAY=MO"] {
        let mut body = rehearsal(stage, "2030-03-04T10:00:00Z", "2030-03-04T12:00:00Z");
        body["recurrence_rule"] = json!(rule);

        let (status, error) = t.post("/api/schedule/events", &t.admin_token, body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", rule);
        assert_eq!(error_code(&error), "BAD_REQUEST");

        let (status, _) = t.post("/api/schedule/conflicts", &t.admin_token, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
