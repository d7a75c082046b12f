//! Public poster proxy.

use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /public/files-proxy/{*key}
pub async fn files_proxy(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Response> {
    let poster = state
        .services
        .posters
        .open(&key)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    Ok((
        [
            (CONTENT_TYPE, poster.content_type),
            (CACHE_CONTROL, format!("public, max-age={}", poster.max_age_secs)),
        ],
        poster.bytes,
    )
        .into_response())
}
