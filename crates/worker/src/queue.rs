//! Durable job queue with manual acknowledgement.
//!
//! A fetched [`Delivery`] stays claimed until it is acked (removed) or
//! nacked (requeued to the tail, or dropped). Claims that are never
//! settled expire after the visibility timeout and are delivered again.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use gigs_core::types::DbId;
use gigs_db::repositories::GigJobRepo;
use gigs_db::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// No live connection; callers fail fast instead of buffering.
    #[error("Queue connection is unavailable")]
    Unavailable,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl QueueError {
    /// Errors that mean the connection has to be re-established.
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::Unavailable
                | Self::Database(
                    sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
                )
        )
    }
}

/// A claimed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: DbId,
    pub payload: Vec<u8>,
    /// 1 on first delivery.
    pub delivery_count: i32,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn publish(&self, payload: &[u8]) -> Result<DbId, QueueError>;

    /// Claim up to `limit` messages.
    async fn fetch(&self, limit: usize) -> Result<Vec<Delivery>, QueueError>;

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Settle negatively: back to the tail when `requeue`, dropped otherwise.
    async fn nack(&self, delivery: &Delivery, requeue: bool) -> Result<(), QueueError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

/// [`JobQueue`] over the `gig_jobs` table.
pub struct PgJobQueue {
    pool: DbPool,
    queue: String,
    consumer: String,
    visibility_timeout_secs: i64,
}

impl PgJobQueue {
    pub fn new(
        pool: DbPool,
        queue: impl Into<String>,
        consumer: impl Into<String>,
        visibility_timeout_secs: i64,
    ) -> Self {
        Self {
            pool,
            queue: queue.into(),
            consumer: consumer.into(),
            visibility_timeout_secs,
        }
    }

    /// Open a dedicated pool and check that it answers.
    pub async fn connect(
        url: &str,
        queue: &str,
        consumer: &str,
        visibility_timeout_secs: i64,
    ) -> Result<Self, QueueError> {
        let pool = gigs_db::create_pool(url).await?;
        gigs_db::health_check(&pool).await?;
        Ok(Self::new(pool, queue, consumer, visibility_timeout_secs))
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn publish(&self, payload: &[u8]) -> Result<DbId, QueueError> {
        let job = GigJobRepo::enqueue(&self.pool, &self.queue, payload).await?;
        tracing::debug!(job_id = job.id, queue = %self.queue, "Job published");
        Ok(job.id)
    }

    async fn fetch(&self, limit: usize) -> Result<Vec<Delivery>, QueueError> {
        let released =
            GigJobRepo::release_expired(&self.pool, &self.queue, self.visibility_timeout_secs)
                .await?;
        if released > 0 {
            tracing::warn!(released, queue = %self.queue, "Released expired job claims");
        }

        let jobs = GigJobRepo::claim_batch(
            &self.pool,
            &self.queue,
            &self.consumer,
            i64::try_from(limit).unwrap_or(i64::MAX),
        )
        .await?;
        Ok(jobs
            .into_iter()
            .map(|job| Delivery {
                id: job.id,
                payload: job.payload,
                delivery_count: job.delivery_count,
            })
            .collect())
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        GigJobRepo::ack(&self.pool, delivery.id).await?;
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery, requeue: bool) -> Result<(), QueueError> {
        if requeue {
            GigJobRepo::requeue(&self.pool, delivery.id).await?;
        } else {
            GigJobRepo::ack(&self.pool, delivery.id).await?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

/// In-process [`JobQueue`]. Messages are lost on restart.
#[derive(Default)]
pub struct MemoryQueue {
    ready: Mutex<VecDeque<Delivery>>,
    in_flight: Mutex<HashMap<DbId, Delivery>>,
    next_id: AtomicI64,
    acks: AtomicUsize,
    requeues: AtomicUsize,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ready_len(&self) -> usize {
        self.ready.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn ack_count(&self) -> usize {
        self.acks.load(Ordering::SeqCst)
    }

    pub fn requeue_count(&self) -> usize {
        self.requeues.load(Ordering::SeqCst)
    }

    fn settle(&self, delivery: &Delivery) -> Option<Delivery> {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&delivery.id)
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn publish(&self, payload: &[u8]) -> Result<DbId, QueueError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.ready
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Delivery {
                id,
                payload: payload.to_vec(),
                delivery_count: 0,
            });
        Ok(id)
    }

    async fn fetch(&self, limit: usize) -> Result<Vec<Delivery>, QueueError> {
        let mut ready = self.ready.lock().unwrap_or_else(|e| e.into_inner());
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        let take = limit.min(ready.len());
        let batch: Vec<Delivery> = ready
            .drain(..take)
            .map(|mut delivery| {
                delivery.delivery_count += 1;
                in_flight.insert(delivery.id, delivery.clone());
                delivery
            })
            .collect();
        Ok(batch)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        if self.settle(delivery).is_some() {
            self.acks.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery, requeue: bool) -> Result<(), QueueError> {
        let Some(settled) = self.settle(delivery) else {
            return Ok(());
        };
        if requeue {
            self.requeues.fetch_add(1, Ordering::SeqCst);
            self.ready
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push_back(settled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_claims_in_order_up_to_limit() {
        let queue = MemoryQueue::new();
        for payload in [b"a", b"b", b"c"] {
            queue.publish(payload).await.unwrap();
        }

        let batch = queue.fetch(2).await.unwrap();
        assert_eq!(batch.iter().map(|d| d.payload.clone()).collect::<Vec<_>>(), [b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(queue.in_flight_len(), 2);
        assert_eq!(queue.ready_len(), 1);
    }

    #[tokio::test]
    async fn requeued_message_goes_to_the_tail() {
        let queue = MemoryQueue::new();
        queue.publish(b"first").await.unwrap();
        queue.publish(b"second").await.unwrap();

        let first = queue.fetch(1).await.unwrap().remove(0);
        queue.nack(&first, true).await.unwrap();

        let batch = queue.fetch(10).await.unwrap();
        assert_eq!(batch[0].payload, b"second");
        assert_eq!(batch[1].payload, b"first");
        assert_eq!(batch[1].delivery_count, 2);
    }

    #[tokio::test]
    async fn ack_and_drop_remove_the_message() {
        let queue = MemoryQueue::new();
        queue.publish(b"a").await.unwrap();
        queue.publish(b"b").await.unwrap();
        let batch = queue.fetch(2).await.unwrap();

        queue.ack(&batch[0]).await.unwrap();
        queue.ack(&batch[0]).await.unwrap();
        queue.nack(&batch[1], false).await.unwrap();

        assert_eq!(queue.ack_count(), 1);
        assert!(queue.fetch(10).await.unwrap().is_empty());
        assert_eq!(queue.in_flight_len(), 0);
    }

    #[test]
    fn connection_errors_are_classified() {
        assert!(QueueError::Unavailable.is_connection_lost());
        assert!(QueueError::Database(sqlx::Error::PoolTimedOut).is_connection_lost());
        assert!(!QueueError::Database(sqlx::Error::RowNotFound).is_connection_lost());
    }
}
