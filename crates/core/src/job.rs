//! Queue payload for asynchronous gig creation.
//!
//! Payloads are decoded once at the boundary. Anything that does not decode
//! into [`CreateGigJob`] is a poison message.

use serde::{Deserialize, Serialize};

use crate::gig::GigFields;
use crate::hashing::sha256_hex;
use crate::types::{ChatId, Timestamp};

/// Poster already resolved by the producer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPoster {
    pub bucket_path: Option<String>,
    pub external_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobGig {
    #[serde(flatten)]
    pub fields: GigFields,
    #[serde(default)]
    pub poster: Option<JobPoster>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedBy {
    #[serde(default)]
    pub is_admin: Option<bool>,
    /// Verified submitter, when the job came from an authenticated request.
    #[serde(default)]
    pub user_id: Option<ChatId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMeta {
    #[serde(default)]
    pub enqueued_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGigJob {
    pub gig: JobGig,
    #[serde(default)]
    pub requested_by: Option<RequestedBy>,
    #[serde(default)]
    pub meta: Option<JobMeta>,
}

impl CreateGigJob {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobDecodeError {
    #[error("payload is not valid JSON: {0}")]
    NotJson(serde_json::Error),

    #[error("payload is not a JSON object")]
    NotObject,

    #[error("payload does not match the job schema: {0}")]
    Schema(serde_json::Error),
}

/// Idempotency key of a raw payload. Every redelivery of a job carries the
/// same bytes and so the same key; producers stamp `meta.enqueuedAt`, which
/// keeps separate submissions of one gig apart.
pub fn submission_key(payload: &[u8]) -> String {
    sha256_hex(payload)
}

/// Decode a raw queue payload.
pub fn decode_job(payload: &[u8]) -> Result<CreateGigJob, JobDecodeError> {
    let value: serde_json::Value =
        serde_json::from_slice(payload).map_err(JobDecodeError::NotJson)?;
    if !value.is_object() {
        return Err(JobDecodeError::NotObject);
    }
    serde_json::from_value(value).map_err(JobDecodeError::Schema)
}
