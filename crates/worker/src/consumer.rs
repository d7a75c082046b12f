//! Gig-creation job consumer.
//!
//! | Outcome                          | Settlement          |
//! |----------------------------------|---------------------|
//! | job processed                    | ack                 |
//! | payload does not decode          | ack (dropped)       |
//! | job fails validation             | ack (dropped)       |
//! | any other failure                | nack with requeue   |
//!
//! Requeue is unbounded; a job that keeps failing cycles behind the rest of
//! the queue until it succeeds. Handlers get the payload's submission key so
//! a redelivered job never creates a second gig.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::FutureExt;
use futures::stream::{self, StreamExt};
use gigs_core::job::{decode_job, submission_key, CreateGigJob};
use gigs_core::types::DbId;
use gigs_pipeline::{PipelineError, SubmissionPipeline};
use tokio_util::sync::CancellationToken;

use crate::connection::QueueConnection;
use crate::queue::{Delivery, JobQueue, QueueError};

/// Processes one decoded job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Returns the id of the gig created for `submission_key`.
    async fn handle(&self, job: CreateGigJob, submission_key: &str) -> Result<DbId, PipelineError>;
}

#[async_trait]
impl JobHandler for SubmissionPipeline {
    async fn handle(&self, job: CreateGigJob, submission_key: &str) -> Result<DbId, PipelineError> {
        let gig = self.process_job(job, submission_key).await?;
        Ok(gig.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Acked,
    Dropped,
    Requeued,
}

pub struct GigJobConsumer {
    connection: Arc<QueueConnection>,
    handler: Arc<dyn JobHandler>,
    prefetch: usize,
    poll_interval: Duration,
}

impl GigJobConsumer {
    pub fn new(
        connection: Arc<QueueConnection>,
        handler: Arc<dyn JobHandler>,
        prefetch: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            connection,
            handler,
            prefetch: prefetch.max(1),
            poll_interval,
        }
    }

    /// Handle one delivery and settle it exactly once.
    pub async fn process_delivery(
        &self,
        queue: &dyn JobQueue,
        delivery: &Delivery,
    ) -> Result<DeliveryOutcome, QueueError> {
        let job = match decode_job(&delivery.payload) {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(
                    job_id = delivery.id,
                    error = %e,
                    "Dropping malformed job payload"
                );
                queue.ack(delivery).await?;
                return Ok(DeliveryOutcome::Dropped);
            }
        };

        let key = submission_key(&delivery.payload);
        match self.handler.handle(job, &key).await {
            Ok(gig_id) => {
                tracing::info!(job_id = delivery.id, gig_id, "Job processed");
                queue.ack(delivery).await?;
                Ok(DeliveryOutcome::Acked)
            }
            Err(e) if e.is_client_error() => {
                tracing::warn!(
                    job_id = delivery.id,
                    error = %e,
                    "Dropping job rejected by validation"
                );
                queue.ack(delivery).await?;
                Ok(DeliveryOutcome::Dropped)
            }
            Err(e) => {
                tracing::error!(
                    job_id = delivery.id,
                    delivery_count = delivery.delivery_count,
                    error = %e,
                    "Job failed, requeueing"
                );
                queue.nack(delivery, true).await?;
                Ok(DeliveryOutcome::Requeued)
            }
        }
    }

    /// Fetch one batch and process it with at most `prefetch` jobs in flight.
    ///
    /// Returns how many deliveries were settled.
    pub async fn run_once(&self) -> Result<usize, QueueError> {
        let queue = self.connection.current()?;
        let batch = queue.fetch(self.prefetch).await?;
        if batch.is_empty() {
            return Ok(0);
        }
        tracing::debug!(count = batch.len(), "Fetched jobs");

        let results: Vec<Result<DeliveryOutcome, QueueError>> = stream::iter(batch.iter())
            .map(|delivery| {
                let queue = Arc::clone(&queue);
                async move { self.process_delivery(queue.as_ref(), delivery).await }
            })
            .buffer_unordered(self.prefetch)
            .collect::<Vec<_>>()
            .boxed()
            .await;

        let mut settled = 0;
        let mut lost = None;
        for result in results {
            match result {
                Ok(_) => settled += 1,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to settle job");
                    if e.is_connection_lost() {
                        lost = Some(e);
                    }
                }
            }
        }
        match lost {
            Some(e) => Err(e),
            None => Ok(settled),
        }
    }

    /// Consume until `cancel` fires, reconnecting whenever the connection
    /// drops.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            prefetch = self.prefetch,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Job consumer started"
        );
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if !self.connection.is_connected() && !self.connection.reconnect(&cancel).await {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    loop {
                        match self.run_once().await {
                            Ok(0) => break,
                            Ok(_) if cancel.is_cancelled() => break,
                            Ok(_) => continue,
                            Err(e) => {
                                if e.is_connection_lost() {
                                    self.connection.mark_lost();
                                } else {
                                    tracing::error!(error = %e, "Job poll failed");
                                }
                                break;
                            }
                        }
                    }
                }
            }
        }
        tracing::info!("Job consumer stopped");
    }
}
