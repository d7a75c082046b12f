//! Gig entity model and insert DTO.

use gigs_core::gig::{GigStatus, MessageRef, PostRef, PosterAsset};
use gigs_core::types::{ChatId, DbId, EpochMillis, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `gigs` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Gig {
    pub id: DbId,
    pub public_id: String,
    pub title: String,
    pub date_ms: EpochMillis,
    pub end_date_ms: Option<EpochMillis>,
    pub venue: String,
    pub city: String,
    pub country: String,
    pub tickets_url: String,
    pub poster_bucket_path: Option<String>,
    pub poster_external_url: Option<String>,
    pub poster_file_id: Option<String>,
    pub status_id: i16,
    pub post_message_id: Option<i64>,
    pub post_chat_id: Option<ChatId>,
    pub post_file_id: Option<String>,
    pub suggested_by_user_id: Option<ChatId>,
    pub suggested_by_feedback_chat_id: Option<ChatId>,
    pub suggested_by_feedback_message_id: Option<i64>,
    pub moderation_chat_id: Option<ChatId>,
    pub moderation_message_id: Option<i64>,
    /// Digest of the queued job payload this gig was created from.
    pub submission_key: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Gig {
    /// Decoded status. Unknown ids never leave the database because of the
    /// foreign key to `gig_statuses`; they read as `New`.
    pub fn status(&self) -> GigStatus {
        GigStatus::from_id(self.status_id).unwrap_or(GigStatus::New)
    }

    pub fn poster(&self) -> Option<PosterAsset> {
        let poster = PosterAsset {
            bucket_path: self.poster_bucket_path.clone(),
            external_url: self.poster_external_url.clone(),
            file_id: self.poster_file_id.clone(),
        };
        (!poster.is_empty()).then_some(poster)
    }

    pub fn post(&self) -> Option<PostRef> {
        Some(PostRef {
            message_id: self.post_message_id?,
            chat_id: self.post_chat_id?,
            file_id: self.post_file_id.clone(),
        })
    }

    /// Feedback message sent to the submitter, if any.
    pub fn feedback_message(&self) -> Option<MessageRef> {
        Some(MessageRef {
            chat_id: self.suggested_by_feedback_chat_id?,
            message_id: self.suggested_by_feedback_message_id?,
        })
    }

    /// Message carrying the moderation buttons, if sent.
    pub fn moderation_message(&self) -> Option<MessageRef> {
        Some(MessageRef {
            chat_id: self.moderation_chat_id?,
            message_id: self.moderation_message_id?,
        })
    }
}

/// DTO for inserting a new gig in status `New`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateGig {
    pub public_id: String,
    pub title: String,
    pub date_ms: EpochMillis,
    pub end_date_ms: Option<EpochMillis>,
    pub venue: String,
    pub city: String,
    pub country: String,
    pub tickets_url: String,
    pub poster: Option<PosterAsset>,
    pub suggested_by_user_id: Option<ChatId>,
    pub submission_key: Option<String>,
}
