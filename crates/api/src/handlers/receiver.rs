//! Platform webhook and gig submission.

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::{Extension, Json};
use gigs_core::error::CoreError;
use gigs_core::gig::GigFields;
use gigs_pipeline::poster::PosterSource;
use gigs_pipeline::{Submission, Submitter};
use gigs_telegram::types::Update;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::webhook_guard::WebhookVerdict;
use crate::state::AppState;

/// Form and JSON field carrying the signed init data.
const INIT_DATA_FIELD: &str = "telegramInitDataString";
const PHOTO_FIELD: &str = "photo";
const GIG_FIELD: &str = "gig";

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

/// POST /v1/receiver/webhook
///
/// Always `200`. Denied deliveries are dropped without side effects.
pub async fn webhook(
    State(state): State<AppState>,
    Extension(verdict): Extension<WebhookVerdict>,
    body: Bytes,
) -> StatusCode {
    if !verdict.is_allowed() {
        return StatusCode::OK;
    }
    match serde_json::from_slice::<Update>(&body) {
        Ok(update) => state.services.updates.dispatch(&update).await,
        Err(e) => tracing::warn!(error = %e, "Ignoring undecodable update"),
    }
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// JSON body of a submission.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGigBody {
    #[serde(default)]
    pub gig: GigFields,
    #[serde(default)]
    pub telegram_init_data_string: Option<String>,
}

/// A decoded submission request, before authentication.
#[derive(Debug, Default)]
struct SubmissionForm {
    fields: GigFields,
    init_data: Option<String>,
    photo: Option<PosterSource>,
}

/// Set a `gig` field by its wire name. Returns `false` for unknown names.
fn set_field(fields: &mut GigFields, name: &str, value: String) -> bool {
    let slot = match name {
        "title" => &mut fields.title,
        "date" => &mut fields.date,
        "endDate" => &mut fields.end_date,
        "city" => &mut fields.city,
        "country" => &mut fields.country,
        "venue" => &mut fields.venue,
        "ticketsUrl" => &mut fields.tickets_url,
        "posterUrl" => &mut fields.poster_url,
        "posterFile" => &mut fields.poster_file,
        _ => return false,
    };
    *slot = Some(value);
    true
}

/// `gig.title` or `gig[title]`.
fn nested_gig_field(name: &str) -> Option<&str> {
    name.strip_prefix("gig.").or_else(|| {
        name.strip_prefix("gig[")
            .and_then(|rest| rest.strip_suffix(']'))
    })
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().starts_with("multipart/form-data"))
}

async fn read_multipart(mut multipart: Multipart, max_upload_bytes: usize) -> AppResult<SubmissionForm> {
    let mut form = SubmissionForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == PHOTO_FIELD {
            let filename = field.file_name().map(str::to_string);
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            if bytes.is_empty() && filename.as_deref().unwrap_or_default().is_empty() {
                continue;
            }
            if !content_type.to_ascii_lowercase().starts_with("image/") {
                return Err(AppError::BadRequest("photo must be an image".into()));
            }
            if bytes.len() > max_upload_bytes {
                return Err(AppError::BadRequest(format!(
                    "photo must be at most {max_upload_bytes} bytes"
                )));
            }
            form.photo = Some(PosterSource::Upload {
                bytes: bytes.to_vec(),
                filename,
                content_type,
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        if name == INIT_DATA_FIELD {
            form.init_data = Some(value);
        } else if name == GIG_FIELD {
            form.fields = serde_json::from_str(&value)
                .map_err(|_| AppError::BadRequest("gig must be a valid JSON string".into()))?;
        } else if let Some(key) = nested_gig_field(&name) {
            if !set_field(&mut form.fields, key, value) {
                tracing::debug!(field = %name, "Ignoring unknown gig field");
            }
        }
    }
    Ok(form)
}

async fn read_form(state: &AppState, request: Request) -> AppResult<SubmissionForm> {
    if is_multipart(&request) {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        return read_multipart(multipart, state.config.max_upload_bytes).await;
    }

    let Json(body) = Json::<CreateGigBody>::from_request(request, state)
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(SubmissionForm {
        fields: body.gig,
        init_data: body.telegram_init_data_string,
        photo: None,
    })
}

/// Verify init data. Every failure is `403` with a stable message.
async fn authenticate(state: &AppState, init_data: Option<&str>) -> AppResult<Submitter> {
    let raw = init_data.map(str::trim).filter(|raw| !raw.is_empty()).ok_or_else(|| {
        AppError::Core(CoreError::Forbidden("Missing Telegram user data".into()))
    })?;

    let user = state.verifier.verify(raw).map_err(|e| {
        tracing::warn!(error = %e, "Rejected submission init data");
        AppError::Core(CoreError::Forbidden("Invalid Telegram user data".into()))
    })?;

    let is_admin = match state.services.moderators.is_moderator(user.id).await {
        Ok(is_admin) => is_admin,
        Err(e) => {
            tracing::warn!(user_id = user.id, error = %e, "Moderator lookup failed");
            false
        }
    };
    Ok(Submitter {
        user_id: user.id,
        is_admin,
    })
}

/// POST /v1/receiver/gig
///
/// Multipart (`gig` JSON string or `gig.<field>` parts, optional `photo`
/// file, `telegramInitDataString`) or a JSON body. `201` on success.
pub async fn create_gig(State(state): State<AppState>, request: Request) -> AppResult<StatusCode> {
    let form = read_form(&state, request).await?;
    let submitter = authenticate(&state, form.init_data.as_deref()).await?;

    let submission = Submission {
        fields: form.fields,
        poster: form.photo,
        submitter: Some(submitter),
    };

    match (&state.queue, state.config.queue_submissions) {
        (Some(queue), true) => {
            let job = state.services.submissions.stage(submission).await?;
            let payload = job
                .to_bytes()
                .map_err(|e| AppError::InternalError(format!("Failed to encode job: {e}")))?;
            let job_id = queue
                .publish(&payload)
                .await
                .map_err(|e| AppError::InternalError(format!("Failed to enqueue gig: {e}")))?;
            tracing::info!(job_id, user_id = submitter.user_id, "Gig queued");
        }
        _ => {
            let gig = state.services.submissions.submit(submission).await?;
            tracing::info!(gig_id = gig.id, public_id = %gig.public_id, "Gig created");
        }
    }
    Ok(StatusCode::CREATED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_field_names() {
        assert_eq!(nested_gig_field("gig.title"), Some("title"));
        assert_eq!(nested_gig_field("gig[ticketsUrl]"), Some("ticketsUrl"));
        assert_eq!(nested_gig_field("title"), None);
        assert_eq!(nested_gig_field("gig[title"), None);
    }

    #[test]
    fn fields_are_set_by_wire_name() {
        let mut fields = GigFields::default();
        assert!(set_field(&mut fields, "ticketsUrl", "https://t.test/1".into()));
        assert!(set_field(&mut fields, "endDate", "2026-01-24".into()));
        assert!(!set_field(&mut fields, "price", "10".into()));
        assert_eq!(fields.tickets_url.as_deref(), Some("https://t.test/1"));
        assert_eq!(fields.end_date.as_deref(), Some("2026-01-24"));
    }
}
