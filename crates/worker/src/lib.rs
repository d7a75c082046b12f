//! Durable gig-creation queue: storage, the shared reconnecting connection
//! and the consumer that runs queued submissions through the pipeline.

pub mod config;
pub mod connection;
pub mod consumer;
pub mod queue;

use std::sync::Arc;

pub use config::QueueConfig;
pub use connection::{connector, Connector, QueueConnection};
pub use consumer::{DeliveryOutcome, GigJobConsumer, JobHandler};
pub use queue::{Delivery, JobQueue, MemoryQueue, PgJobQueue, QueueError};

/// Connector opening a [`PgJobQueue`] for `config`, claiming as `consumer`.
pub fn pg_connector(config: &QueueConfig, consumer: &str) -> Connector {
    let url = config.url.clone();
    let queue = config.queue.clone();
    let consumer = consumer.to_string();
    let visibility_timeout_secs = config.visibility_timeout_secs;
    connector(move || {
        let url = url.clone();
        let queue = queue.clone();
        let consumer = consumer.clone();
        async move {
            let opened =
                PgJobQueue::connect(&url, &queue, &consumer, visibility_timeout_secs).await?;
            Ok(Arc::new(opened) as Arc<dyn JobQueue>)
        }
    })
}
