//! Persistence seam for gig records.
//!
//! [`GigStore`] is what the pipeline talks to; [`PgGigStore`] forwards to
//! the `gigs-db` repositories and the in-memory fake lives in the `testing`
//! module.

use async_trait::async_trait;
use gigs_core::gig::{GigStatus, MessageRef, PostRef};
use gigs_core::types::DbId;
use gigs_db::models::gig::{CreateGig, Gig};
use gigs_db::repositories::gig_repo::{is_public_id_conflict, is_submission_key_conflict};
use gigs_db::repositories::GigRepo;
use sqlx::PgPool;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Another record claimed the public id between lookup and insert.
    #[error("Public id '{0}' is already taken")]
    PublicIdTaken(String),

    /// A gig was already created from the same queued job.
    #[error("Submission '{0}' was already stored")]
    SubmissionKeyTaken(String),
}

#[async_trait]
pub trait GigStore: Send + Sync {
    /// Insert a `New` gig. A public id collision is [`StoreError::PublicIdTaken`],
    /// a submission key collision [`StoreError::SubmissionKeyTaken`].
    async fn insert(&self, input: &CreateGig) -> Result<Gig, StoreError>;

    async fn find(&self, id: DbId) -> Result<Option<Gig>, StoreError>;

    async fn find_by_submission_key(&self, key: &str) -> Result<Option<Gig>, StoreError>;

    async fn public_id_exists(&self, public_id: &str) -> Result<bool, StoreError>;

    async fn find_by_external_poster_url(&self, url: &str) -> Result<Option<Gig>, StoreError>;

    async fn find_by_poster_bucket_path(&self, key: &str) -> Result<Option<Gig>, StoreError>;

    /// Move `id` from `expected` to `next`; `None` when the status no longer
    /// matches or the row is gone.
    async fn compare_and_set_status(
        &self,
        id: DbId,
        expected: GigStatus,
        next: GigStatus,
    ) -> Result<Option<Gig>, StoreError>;

    async fn set_poster_file_id(&self, id: DbId, file_id: &str) -> Result<(), StoreError>;

    async fn set_post(&self, id: DbId, post: &PostRef) -> Result<(), StoreError>;

    async fn set_feedback_message(&self, id: DbId, message: MessageRef) -> Result<(), StoreError>;

    async fn set_moderation_message(
        &self,
        id: DbId,
        message: MessageRef,
    ) -> Result<(), StoreError>;
}

/// PostgreSQL-backed [`GigStore`].
#[derive(Clone)]
pub struct PgGigStore {
    pool: PgPool,
}

impl PgGigStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GigStore for PgGigStore {
    async fn insert(&self, input: &CreateGig) -> Result<Gig, StoreError> {
        GigRepo::create(&self.pool, input).await.map_err(|e| {
            if is_public_id_conflict(&e) {
                StoreError::PublicIdTaken(input.public_id.clone())
            } else if is_submission_key_conflict(&e) {
                StoreError::SubmissionKeyTaken(input.submission_key.clone().unwrap_or_default())
            } else {
                StoreError::Database(e)
            }
        })
    }

    async fn find(&self, id: DbId) -> Result<Option<Gig>, StoreError> {
        Ok(GigRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_by_submission_key(&self, key: &str) -> Result<Option<Gig>, StoreError> {
        Ok(GigRepo::find_by_submission_key(&self.pool, key).await?)
    }

    async fn public_id_exists(&self, public_id: &str) -> Result<bool, StoreError> {
        Ok(GigRepo::public_id_exists(&self.pool, public_id).await?)
    }

    async fn find_by_external_poster_url(&self, url: &str) -> Result<Option<Gig>, StoreError> {
        Ok(GigRepo::find_by_external_poster_url(&self.pool, url).await?)
    }

    async fn find_by_poster_bucket_path(&self, key: &str) -> Result<Option<Gig>, StoreError> {
        Ok(GigRepo::find_by_poster_bucket_path(&self.pool, key).await?)
    }

    async fn compare_and_set_status(
        &self,
        id: DbId,
        expected: GigStatus,
        next: GigStatus,
    ) -> Result<Option<Gig>, StoreError> {
        Ok(GigRepo::compare_and_set_status(&self.pool, id, expected, next).await?)
    }

    async fn set_poster_file_id(&self, id: DbId, file_id: &str) -> Result<(), StoreError> {
        Ok(GigRepo::set_poster_file_id(&self.pool, id, file_id).await?)
    }

    async fn set_post(&self, id: DbId, post: &PostRef) -> Result<(), StoreError> {
        Ok(GigRepo::set_post(&self.pool, id, post).await?)
    }

    async fn set_feedback_message(&self, id: DbId, message: MessageRef) -> Result<(), StoreError> {
        Ok(GigRepo::set_feedback_message(&self.pool, id, message).await?)
    }

    async fn set_moderation_message(
        &self,
        id: DbId,
        message: MessageRef,
    ) -> Result<(), StoreError> {
        Ok(GigRepo::set_moderation_message(&self.pool, id, message).await?)
    }
}
