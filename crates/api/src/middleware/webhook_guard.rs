//! Guard for the platform webhook.
//!
//! The platform retries any non-2xx delivery, so the guard never rejects.
//! It checks the shared secret header, resolves the acting user and stores
//! the outcome as a [`WebhookVerdict`] request extension for the handler.

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use gigs_core::types::ChatId;
use gigs_telegram::types::Update;
use subtle::ConstantTimeEq;

use crate::state::AppState;

/// Header the platform echoes the configured secret in.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Largest update body the guard reads.
const MAX_UPDATE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    BadSecret,
    UnreadableBody,
    NoActor,
    NotModerator,
    LookupFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookVerdict {
    Allowed { user_id: ChatId },
    Denied(DenyReason),
}

impl WebhookVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Constant-time comparison of the secret header with `expected`.
pub fn secret_matches(headers: &HeaderMap, expected: &str) -> bool {
    let Some(provided) = headers.get(SECRET_HEADER) else {
        return false;
    };
    !expected.is_empty() && bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
}

async fn verdict_for(state: &AppState, body: &[u8]) -> WebhookVerdict {
    let Ok(update) = serde_json::from_slice::<Update>(body) else {
        return WebhookVerdict::Denied(DenyReason::UnreadableBody);
    };
    let Some(actor) = update.actor() else {
        return WebhookVerdict::Denied(DenyReason::NoActor);
    };
    match state.services.moderators.is_moderator(actor.id).await {
        Ok(true) => WebhookVerdict::Allowed { user_id: actor.id },
        Ok(false) => WebhookVerdict::Denied(DenyReason::NotModerator),
        Err(e) => {
            tracing::error!(user_id = actor.id, error = %e, "Moderator lookup failed");
            WebhookVerdict::Denied(DenyReason::LookupFailed)
        }
    }
}

pub async fn webhook_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let (verdict, bytes) = if !secret_matches(&parts.headers, &state.webhook_secret) {
        (WebhookVerdict::Denied(DenyReason::BadSecret), Default::default())
    } else {
        match to_bytes(body, MAX_UPDATE_BYTES).await {
            Ok(bytes) => (verdict_for(&state, &bytes).await, bytes),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read webhook body");
                (WebhookVerdict::Denied(DenyReason::UnreadableBody), Default::default())
            }
        }
    };

    if let WebhookVerdict::Denied(reason) = verdict {
        tracing::warn!(?reason, "Webhook delivery denied");
    }
    parts.extensions.insert(verdict);
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
