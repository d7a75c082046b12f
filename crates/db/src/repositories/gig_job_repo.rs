//! Repository for the `gig_jobs` queue table.
//!
//! A job is deliverable when it is unclaimed and `available_at` has passed.
//! Claims use `FOR UPDATE SKIP LOCKED` so concurrent consumers never receive
//! the same row. Acknowledging deletes the row; requeueing clears the claim
//! and moves the job behind everything already waiting.

use gigs_core::types::DbId;
use sqlx::PgPool;

use crate::models::gig_job::GigJob;

const COLUMNS: &str =
    "id, queue, payload, delivery_count, available_at, claimed_at, claimed_by, created_at";

pub struct GigJobRepo;

impl GigJobRepo {
    pub async fn enqueue(pool: &PgPool, queue: &str, payload: &[u8]) -> Result<GigJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO gig_jobs (queue, payload) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GigJob>(&query)
            .bind(queue)
            .bind(payload)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim up to `limit` deliverable jobs for `consumer`.
    pub async fn claim_batch(
        pool: &PgPool,
        queue: &str,
        consumer: &str,
        limit: i64,
    ) -> Result<Vec<GigJob>, sqlx::Error> {
        let query = format!(
            "UPDATE gig_jobs \
             SET claimed_at = NOW(), claimed_by = $2, delivery_count = delivery_count + 1 \
             WHERE id IN ( \
                 SELECT id FROM gig_jobs \
                 WHERE queue = $1 AND claimed_at IS NULL AND available_at <= NOW() \
                 ORDER BY available_at ASC, id ASC \
                 LIMIT $3 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        let mut jobs = sqlx::query_as::<_, GigJob>(&query)
            .bind(queue)
            .bind(consumer)
            .bind(limit)
            .fetch_all(pool)
            .await?;
        jobs.sort_by_key(|job| (job.available_at, job.id));
        Ok(jobs)
    }

    /// Delete a claimed job. Returns `false` if it was already gone.
    pub async fn ack(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM gig_jobs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Release a claimed job back to the tail of the queue.
    pub async fn requeue(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE gig_jobs \
             SET claimed_at = NULL, claimed_by = NULL, available_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Release claims older than `visibility_timeout_secs`.
    pub async fn release_expired(
        pool: &PgPool,
        queue: &str,
        visibility_timeout_secs: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE gig_jobs \
             SET claimed_at = NULL, claimed_by = NULL \
             WHERE queue = $1 AND claimed_at IS NOT NULL \
               AND claimed_at < NOW() - make_interval(secs => $2)",
        )
        .bind(queue)
        .bind(visibility_timeout_secs as f64)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn count(pool: &PgPool, queue: &str) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM gig_jobs WHERE queue = $1")
            .bind(queue)
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }
}
