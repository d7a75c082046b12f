//! Repository for the `gigs` table.
//!
//! Status writes are compare-and-swap on the expected current status; the
//! caller validates the transition first.

use gigs_core::gig::{GigStatus, MessageRef, PostRef};
use gigs_core::types::DbId;
use sqlx::PgPool;

use crate::models::gig::{CreateGig, Gig};

/// Column list for `gigs` queries.
const COLUMNS: &str = "\
    id, public_id, title, date_ms, end_date_ms, venue, city, country, tickets_url, \
    poster_bucket_path, poster_external_url, poster_file_id, status_id, \
    post_message_id, post_chat_id, post_file_id, \
    suggested_by_user_id, suggested_by_feedback_chat_id, suggested_by_feedback_message_id, \
    moderation_chat_id, moderation_message_id, submission_key, \
    created_at, updated_at";

/// Unique constraint on `gigs.public_id`.
pub const PUBLIC_ID_CONSTRAINT: &str = "uq_gigs_public_id";

/// Unique constraint on `gigs.submission_key`.
pub const SUBMISSION_KEY_CONSTRAINT: &str = "uq_gigs_submission_key";

fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}

/// Whether `err` is a unique violation on the public id.
pub fn is_public_id_conflict(err: &sqlx::Error) -> bool {
    is_unique_violation(err, PUBLIC_ID_CONSTRAINT)
}

/// Whether `err` is a unique violation on the submission key.
pub fn is_submission_key_conflict(err: &sqlx::Error) -> bool {
    is_unique_violation(err, SUBMISSION_KEY_CONSTRAINT)
}

pub struct GigRepo;

impl GigRepo {
    /// Insert a gig in status `New`.
    pub async fn create(pool: &PgPool, input: &CreateGig) -> Result<Gig, sqlx::Error> {
        let poster = input.poster.clone().unwrap_or_default();
        let query = format!(
            "INSERT INTO gigs (public_id, title, date_ms, end_date_ms, venue, city, country, \
                 tickets_url, poster_bucket_path, poster_external_url, poster_file_id, \
                 status_id, suggested_by_user_id, submission_key) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Gig>(&query)
            .bind(&input.public_id)
            .bind(&input.title)
            .bind(input.date_ms)
            .bind(input.end_date_ms)
            .bind(&input.venue)
            .bind(&input.city)
            .bind(&input.country)
            .bind(&input.tickets_url)
            .bind(&poster.bucket_path)
            .bind(&poster.external_url)
            .bind(&poster.file_id)
            .bind(GigStatus::New.id())
            .bind(input.suggested_by_user_id)
            .bind(&input.submission_key)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Gig>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM gigs WHERE id = $1");
        sqlx::query_as::<_, Gig>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_public_id(
        pool: &PgPool,
        public_id: &str,
    ) -> Result<Option<Gig>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM gigs WHERE public_id = $1");
        sqlx::query_as::<_, Gig>(&query)
            .bind(public_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_submission_key(
        pool: &PgPool,
        key: &str,
    ) -> Result<Option<Gig>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM gigs WHERE submission_key = $1");
        sqlx::query_as::<_, Gig>(&query)
            .bind(key)
            .fetch_optional(pool)
            .await
    }

    pub async fn public_id_exists(pool: &PgPool, public_id: &str) -> Result<bool, sqlx::Error> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM gigs WHERE public_id = $1)")
            .bind(public_id)
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    /// Oldest gig whose poster was downloaded from `url` and stored.
    pub async fn find_by_external_poster_url(
        pool: &PgPool,
        url: &str,
    ) -> Result<Option<Gig>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM gigs \
             WHERE poster_external_url = $1 AND poster_bucket_path IS NOT NULL \
             ORDER BY id ASC LIMIT 1"
        );
        sqlx::query_as::<_, Gig>(&query)
            .bind(url)
            .fetch_optional(pool)
            .await
    }

    /// Gig whose stored poster lives at `key`.
    pub async fn find_by_poster_bucket_path(
        pool: &PgPool,
        key: &str,
    ) -> Result<Option<Gig>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM gigs WHERE poster_bucket_path = $1 ORDER BY id ASC LIMIT 1"
        );
        sqlx::query_as::<_, Gig>(&query)
            .bind(key)
            .fetch_optional(pool)
            .await
    }

    /// Move `id` from `expected` to `next`.
    ///
    /// Returns `None` when the row does not exist or its status is no longer
    /// `expected`.
    pub async fn compare_and_set_status(
        pool: &PgPool,
        id: DbId,
        expected: GigStatus,
        next: GigStatus,
    ) -> Result<Option<Gig>, sqlx::Error> {
        let query = format!(
            "UPDATE gigs SET status_id = $3 \
             WHERE id = $1 AND status_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Gig>(&query)
            .bind(id)
            .bind(expected.id())
            .bind(next.id())
            .fetch_optional(pool)
            .await
    }

    pub async fn set_poster_file_id(
        pool: &PgPool,
        id: DbId,
        file_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE gigs SET poster_file_id = $2 WHERE id = $1")
            .bind(id)
            .bind(file_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_post(pool: &PgPool, id: DbId, post: &PostRef) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE gigs SET post_message_id = $2, post_chat_id = $3, post_file_id = $4 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(post.message_id)
        .bind(post.chat_id)
        .bind(&post.file_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn set_feedback_message(
        pool: &PgPool,
        id: DbId,
        message: MessageRef,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE gigs SET suggested_by_feedback_chat_id = $2, \
                 suggested_by_feedback_message_id = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(message.chat_id)
        .bind(message.message_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn set_moderation_message(
        pool: &PgPool,
        id: DbId,
        message: MessageRef,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE gigs SET moderation_chat_id = $2, moderation_message_id = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(message.chat_id)
        .bind(message.message_id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
