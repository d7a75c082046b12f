//! The webhook answers 200 in every case and only acts for moderators.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::Router;
use common::{body_bytes, default_app, send, SECRET_HEADER, WEBHOOK_SECRET};
use gigs_api::routes::receiver::always_ok;
use gigs_core::gig::GigStatus;
use gigs_pipeline::testing::{callback_query, Harness, PlatformCall, MODERATOR_ID};
use serde_json::json;
use tower::ServiceExt;

const WEBHOOK: &str = "/v1/receiver/webhook";

fn webhook_request(secret: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::post(WEBHOOK).header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header(SECRET_HEADER, secret);
    }
    builder.body(body.into()).unwrap()
}

fn callback_update(data: &str) -> String {
    json!({"update_id": 1, "callback_query": callback_query("cb-1", data)}).to_string()
}

#[tokio::test]
async fn moderator_approval_publishes_and_answers_200() {
    let harness = Harness::new();
    let gig = harness.submit_pending("Foo Bar", "2026-01-23").await;

    let response = send(
        default_app(&harness),
        webhook_request(Some(WEBHOOK_SECRET), callback_update(&format!("approve:{}", gig.id))),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await.is_empty());
    assert_eq!(harness.store.all()[0].status(), GigStatus::Published);
    let answers = harness.platform.answers();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].callback_query_id, "cb-1");
}

#[tokio::test]
async fn bad_secret_is_acknowledged_without_side_effects() {
    let harness = Harness::new();
    let gig = harness.submit_pending("Foo Bar", "2026-01-23").await;
    let calls_before = harness.platform.calls().len();

    for secret in [None, Some("wrong-secret")] {
        let response = send(
            default_app(&harness),
            webhook_request(secret, callback_update(&format!("approve:{}", gig.id))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(harness.platform.calls().len(), calls_before);
    assert_eq!(harness.store.all()[0].status(), GigStatus::Pending);
}

#[tokio::test]
async fn non_moderators_are_ignored() {
    let harness = Harness::new();
    let gig = harness.submit_pending("Foo Bar", "2026-01-23").await;
    let calls_before = harness.platform.calls().len();

    let mut update = json!({"update_id": 1, "callback_query": callback_query("cb-2", &format!("reject:{}", gig.id))});
    update["callback_query"]["from"]["id"] = json!(MODERATOR_ID + 1);

    let response = send(
        default_app(&harness),
        webhook_request(Some(WEBHOOK_SECRET), update.to_string()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(harness.platform.calls().len(), calls_before);
    assert_eq!(harness.store.all()[0].status(), GigStatus::Pending);
}

#[tokio::test]
async fn malformed_bodies_are_acknowledged() {
    let harness = Harness::new();
    for body in ["not json", "[]", r#"{"update_id": "x"}"#, ""] {
        let response = send(
            default_app(&harness),
            webhook_request(Some(WEBHOOK_SECRET), body),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK, "body {body:?}");
    }
    assert!(harness.platform.calls().is_empty());
}

#[tokio::test]
async fn failing_callback_still_answers_200_once() {
    let harness = Harness::new();
    let response = send(
        default_app(&harness),
        webhook_request(Some(WEBHOOK_SECRET), callback_update("approve:999")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let answers = harness.platform.answers();
    assert_eq!(answers.len(), 1);
    assert!(answers[0].show_alert);
}

#[tokio::test]
async fn moderator_commands_get_a_reply() {
    let harness = Harness::new();
    let update = json!({
        "update_id": 5,
        "message": {
            "message_id": 10,
            "chat": {"id": MODERATOR_ID, "type": "private"},
            "from": {"id": MODERATOR_ID, "first_name": "Mod"},
            "text": "/start"
        }
    });

    let response = send(
        default_app(&harness),
        webhook_request(Some(WEBHOOK_SECRET), update.to_string()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let calls = harness.platform.calls();
    assert_eq!(calls.len(), 1);
    assert!(matches!(&calls[0], PlatformCall::SendMessage(m) if m.chat_id == MODERATOR_ID));
}

#[tokio::test]
async fn panics_and_error_statuses_become_200() {
    let app: Router = always_ok(
        Router::new()
            .route("/panic", post(|| async { panic!("boom") as () }))
            .route(
                "/fail",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "nope") }),
            ),
    );

    for uri in ["/panic", "/fail"] {
        let response = app
            .clone()
            .oneshot(Request::post(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert!(body_bytes(response).await.is_empty());
    }
}
