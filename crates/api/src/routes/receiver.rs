use std::any::Any;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::{from_fn_with_state, map_response};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;

use crate::config::ServerConfig;
use crate::handlers::receiver;
use crate::middleware::webhook_guard::webhook_guard;
use crate::state::AppState;

/// Multipart overhead allowed on top of the poster itself.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Submission routes.
pub fn router(config: &ServerConfig) -> Router<AppState> {
    Router::new()
        .route("/v1/receiver/gig", post(receiver::create_gig))
        .layer(DefaultBodyLimit::max(
            config.max_upload_bytes + FORM_OVERHEAD_BYTES,
        ))
}

/// The webhook route: guarded, and acknowledged with `200` whatever
/// happens inside.
pub fn webhook_router(state: AppState) -> Router<AppState> {
    always_ok(
        Router::new()
            .route("/v1/receiver/webhook", post(receiver::webhook))
            .route_layer(from_fn_with_state(state, webhook_guard)),
    )
}

/// Turn every response of `router` into an empty `200`, panics included.
pub fn always_ok<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(CatchPanicLayer::custom(swallow_panic))
        .layer(map_response(acknowledge))
}

fn swallow_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(detail, "Webhook handler panicked");
    StatusCode::OK.into_response()
}

async fn acknowledge(response: Response) -> StatusCode {
    if response.status() != StatusCode::OK {
        tracing::warn!(status = %response.status(), "Webhook response replaced with 200");
    }
    StatusCode::OK
}
