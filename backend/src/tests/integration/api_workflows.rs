use axum::http::{Method, StatusCode};
use chrono::DateTime;
use serde_json::{Value, json};

use crate::tests::helpers::{engine_with_clock, send_json, test_app};
use crate::workflows::ManualClock;

fn app() -> (axum::Router, ManualClock) {
    let clock = ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
    (test_app(engine_with_clock(clock.clone())), clock)
}

fn reservation(id: &str) -> Value {
    json!({
        "reservation_id": id,
        "booking_number": format!("BK-{}", id),
        "guest_name": "Ada Lovelace",
        "room_type": "double",
        "total_amount": "640.00"
    })
}

fn corporate(id: &str) -> Value {
    let mut body = reservation(id);
    body["company_name"] = json!("Acme Travel");
    body["total_amount"] = json!("1800");
    body
}

async fn create(app: &axum::Router, reservation: Value) -> (StatusCode, Value) {
    send_json(
        app,
        Method::POST,
        "/api/v1/workflows",
        Some(json!({ "reservation": reservation })),
    )
    .await
}

fn step_id(workflow: &Value, index: usize) -> String {
    workflow["steps"][index]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_and_root() {
    let (app, _) = app();

    let (status, body) = send_json(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_workflows"], 0);

    let (status, _) = send_json(&app, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_create_is_idempotent_per_reservation() {
    let (app, _) = app();

    let (status, first) = create(&app, corporate("api-1")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["created"], true);
    assert_eq!(first["workflow"]["workflow_type"], "corporate");
    assert_eq!(first["workflow"]["priority"], "medium");
    assert_eq!(first["workflow"]["status"], "active");

    let (status, second) = create(&app, corporate("api-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["created"], false);
    assert_eq!(second["workflow"]["id"], first["workflow"]["id"]);
}

#[tokio::test]
async fn test_create_validates_reservation() {
    let (app, _) = app();

    let mut invalid = reservation("");
    invalid["total_amount"] = json!("-5");
    let (status, body) = create(&app, invalid).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["details"]["reservation_id"].is_array());
    assert!(body["details"]["total_amount"].is_array());
}

#[tokio::test]
async fn test_unknown_template_is_bad_request() {
    let (app, _) = app();

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/api/v1/workflows",
        Some(json!({ "reservation": reservation("api-2"), "workflow_type": "wedding" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "UNKNOWN_TEMPLATE");
}

#[tokio::test]
async fn test_list_orders_by_priority_then_newest() {
    let (app, clock) = app();

    create(&app, corporate("ord-medium")).await;
    clock.advance_minutes(1);
    let mut vip = reservation("ord-high");
    vip["guest_tier"] = json!("vip");
    create(&app, vip).await;
    clock.advance_minutes(1);
    create(&app, corporate("ord-medium-newer")).await;

    let (status, body) = send_json(&app, Method::GET, "/api/v1/workflows", None).await;
    assert_eq!(status, StatusCode::OK);
    let order: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["reservation_id"].as_str().unwrap())
        .collect();
    assert_eq!(order, vec!["ord-high", "ord-medium-newer", "ord-medium"]);

    let (_, filtered) =
        send_json(&app, Method::GET, "/api/v1/workflows?assigned_role=finance", None).await;
    assert_eq!(filtered.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_approve_replay_returns_same_result() {
    let (app, _) = app();
    let (_, created) = create(&app, corporate("replay-1")).await;
    let id = created["workflow"]["id"].as_str().unwrap().to_string();
    let credit = step_id(&created["workflow"], 1);
    let uri = format!("/api/v1/workflows/{}/steps/{}/approve", id, credit);

    let (status, first) =
        send_json(&app, Method::POST, &uri, Some(json!({ "actor": "ana", "notes": "limit ok" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "completed");
    assert_eq!(first["steps"][1]["completed_by"], "ana");

    let (status, replay) = send_json(&app, Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay, first);

    let (_, history) = send_json(&app, Method::GET, "/api/v1/workflows/history", None).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_error_status_mapping() {
    let (app, _) = app();
    let (_, created) = create(&app, corporate("err-1")).await;
    let id = created["workflow"]["id"].as_str().unwrap().to_string();
    let pending = step_id(&created["workflow"], 2);

    // Approving a step that is not in progress
    let (status, body) = send_json(
        &app,
        Method::POST,
        &format!("/api/v1/workflows/{}/steps/{}/approve", id, pending),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STEP_STATE");

    let missing = uuid::Uuid::new_v4();
    let (status, body) =
        send_json(&app, Method::GET, &format!("/api/v1/workflows/{}", missing), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = send_json(
        &app,
        Method::POST,
        &format!("/api/v1/workflows/{}/steps/{}/complete", id, step_id(&created["workflow"], 1)),
        Some(json!({ "payload": [1, 2, 3] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_manual_step_missing_fields_is_unprocessable() {
    let (app, _) = app();
    let mut vip = reservation("vip-api");
    vip["guest_tier"] = json!("vip");
    let (_, created) = create(&app, vip).await;
    let id = created["workflow"]["id"].as_str().unwrap().to_string();

    send_json(
        &app,
        Method::POST,
        &format!("/api/v1/workflows/{}/steps/{}/approve", id, step_id(&created["workflow"], 1)),
        Some(json!({ "actor": "marta" })),
    )
    .await;

    let complete = format!("/api/v1/workflows/{}/steps/{}/complete", id, step_id(&created["workflow"], 2));
    let (status, body) =
        send_json(&app, Method::POST, &complete, Some(json!({ "payload": { "note": "late" } }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"]["room_number"][0], "is required");

    let (status, body) = send_json(
        &app,
        Method::POST,
        &complete,
        Some(json!({ "actor": "sam", "payload": { "room_number": "701" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
}

#[tokio::test]
async fn test_approve_after_manual_completion_is_not_replayed() {
    let (app, _) = app();
    let mut vip = reservation("vip-mixed");
    vip["guest_tier"] = json!("vip");
    let (_, created) = create(&app, vip).await;
    let id = created["workflow"]["id"].as_str().unwrap().to_string();
    let room_step = step_id(&created["workflow"], 2);

    send_json(
        &app,
        Method::POST,
        &format!("/api/v1/workflows/{}/steps/{}/approve", id, step_id(&created["workflow"], 1)),
        Some(json!({ "actor": "marta" })),
    )
    .await;

    let complete = format!("/api/v1/workflows/{}/steps/{}/complete", id, room_step);
    let (status, completed) =
        send_json(&app, Method::POST, &complete, Some(json!({ "payload": { "room_number": "12" } }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "completed");

    // A retried completion still replays
    let (status, replay) = send_json(&app, Method::POST, &complete, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay, completed);

    let (status, body) = send_json(
        &app,
        Method::POST,
        &format!("/api/v1/workflows/{}/steps/{}/approve", id, room_step),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "WORKFLOW_TERMINATED");
}

#[tokio::test]
async fn test_cancel_then_act_is_conflict() {
    let (app, _) = app();
    let (_, created) = create(&app, corporate("cancel-1")).await;
    let id = created["workflow"]["id"].as_str().unwrap().to_string();
    let cancel = format!("/api/v1/workflows/{}/cancel", id);

    let (status, body) =
        send_json(&app, Method::POST, &cancel, Some(json!({ "reason": "duplicate booking" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["cancellation_reason"], "duplicate booking");

    let (status, again) = send_json(&app, Method::POST, &cancel, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again, body);

    let (status, body) = send_json(
        &app,
        Method::POST,
        &format!("/api/v1/workflows/{}/steps/{}/approve", id, step_id(&created["workflow"], 1)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "WORKFLOW_TERMINATED");

    let (status, _) = send_json(
        &app,
        Method::POST,
        &format!("/api/v1/workflows/{}/cancel", uuid::Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_assignees_and_stats() {
    let (app, _) = app();
    let (_, created) = create(&app, corporate("assign-1")).await;
    create(&app, reservation("assign-2")).await;
    let id = created["workflow"]["id"].as_str().unwrap();

    let (status, body) =
        send_json(&app, Method::GET, &format!("/api/v1/workflows/{}/assignees", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "finance");
    assert_eq!(body["staff"], json!(["ana", "li"]));

    let (status, stats) = send_json(&app, Method::GET, "/api/v1/workflows/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["active"], 1);
    assert_eq!(stats["completed"], 1);
    assert_eq!(stats["by_type"]["standard"], 1);
    assert_eq!(stats["by_type"]["corporate"], 1);
}
