#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use gigs_api::config::ServerConfig;
use gigs_api::router::build_app_router;
use gigs_api::state::AppState;
use gigs_core::init_data::InitDataVerifier;
use gigs_pipeline::testing::Harness;
use gigs_worker::QueueConnection;
use http_body_util::BodyExt;
use tower::ServiceExt;

pub const BOT_TOKEN: &str = "123456:TEST-token";
pub const WEBHOOK_SECRET: &str = "hook-secret";
pub const SUBMITTER_ID: i64 = 4242;
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        max_upload_bytes: 1024 * 1024,
        ..Default::default()
    }
}

/// Build the full application router over the harness fakes.
pub fn build_test_app(
    harness: &Harness,
    config: ServerConfig,
    queue: Option<Arc<QueueConnection>>,
) -> Router {
    let state = AppState {
        pool: None,
        config: Arc::new(config.clone()),
        services: harness.services.clone(),
        verifier: Arc::new(InitDataVerifier::new(BOT_TOKEN)),
        webhook_secret: Arc::from(WEBHOOK_SECRET),
        queue,
    };
    build_app_router(state, &config)
}

pub fn default_app(harness: &Harness) -> Router {
    build_test_app(harness, test_config(), None)
}

/// Init data signed for [`BOT_TOKEN`].
pub fn init_data(user_id: i64, is_bot: bool) -> String {
    let user = format!(r#"{{"id":{user_id},"is_bot":{is_bot},"first_name":"Ana"}}"#);
    InitDataVerifier::new(BOT_TOKEN).sign_fields(&[
        ("query_id", "AAH1"),
        ("user", &user),
        ("auth_date", "1768000000"),
    ])
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: Router, uri: &str, body: &serde_json::Value) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// ---------------------------------------------------------------------------
// Multipart
// ---------------------------------------------------------------------------

pub const BOUNDARY: &str = "gigs-test-boundary";

pub enum FormPart<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

pub fn multipart_body(parts: &[FormPart<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            FormPart::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            FormPart::File {
                name,
                filename,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn post_multipart(app: Router, uri: &str, parts: &[FormPart<'_>]) -> Response<Body> {
    let request = Request::post(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    send(app, request).await
}
