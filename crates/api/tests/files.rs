//! Public poster proxy.

mod common;

use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::StatusCode;
use common::{body_bytes, body_json, default_app, get};
use gigs_cloud::ObjectStore;
use gigs_pipeline::testing::Harness;

const KEY: &str = "gigs/2026/es/valencia/foo.png";

#[tokio::test]
async fn stored_poster_is_served_with_cache_headers() {
    let harness = Harness::new();
    harness
        .objects
        .put(KEY, b"\x89PNG bytes".to_vec(), "image/png")
        .await
        .unwrap();

    let response = get(default_app(&harness), &format!("/public/files-proxy/{KEY}")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
    assert_eq!(response.headers()[CACHE_CONTROL], "public, max-age=3600");
    assert_eq!(body_bytes(response).await, b"\x89PNG bytes");
}

#[tokio::test]
async fn missing_poster_is_not_found() {
    let harness = Harness::new();
    let response = get(default_app(&harness), &format!("/public/files-proxy/{KEY}")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "File not found");
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn keys_outside_the_prefix_are_not_served() {
    let harness = Harness::new();
    harness
        .objects
        .put("private/secret.png", b"secret".to_vec(), "image/png")
        .await
        .unwrap();

    for uri in [
        "/public/files-proxy/private/secret.png",
        "/public/files-proxy/gigs/%2E%2E/private/secret.png",
    ] {
        let response = get(default_app(&harness), uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}
