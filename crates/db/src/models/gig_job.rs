//! Durable queue rows for asynchronous gig creation.

use gigs_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `gig_jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct GigJob {
    pub id: DbId,
    pub queue: String,
    pub payload: Vec<u8>,
    /// Number of times the job has been claimed, including the current claim.
    pub delivery_count: i32,
    pub available_at: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub claimed_by: Option<String>,
    pub created_at: Timestamp,
}
