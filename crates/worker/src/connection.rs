//! Single shared queue connection with fixed-backoff reconnection.
//!
//! While the connection is down every call fails fast with
//! [`QueueError::Unavailable`]; nothing is buffered in memory. The consumer
//! loop owns reconnection through [`QueueConnection::reconnect`].

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use gigs_core::types::DbId;
use tokio_util::sync::CancellationToken;

use crate::queue::{JobQueue, QueueError};

/// Delay between reconnection attempts.
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

/// Opens a fresh queue handle.
pub type Connector =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn JobQueue>, QueueError>> + Send + Sync>;

/// Build a [`Connector`] from an async closure.
pub fn connector<F, Fut>(open: F) -> Connector
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<dyn JobQueue>, QueueError>> + Send + 'static,
{
    Arc::new(move || open().boxed())
}

pub struct QueueConnection {
    connector: Connector,
    current: RwLock<Option<Arc<dyn JobQueue>>>,
    backoff: Duration,
}

impl QueueConnection {
    /// A connection that is down until the first [`Self::reconnect`].
    pub fn new(connector: Connector) -> Self {
        Self {
            connector,
            current: RwLock::new(None),
            backoff: RECONNECT_BACKOFF,
        }
    }

    /// Wrap an already-open queue. Reconnection reuses the same handle.
    pub fn fixed(queue: Arc<dyn JobQueue>) -> Self {
        let handle = Arc::clone(&queue);
        let connection = Self::new(connector(move || {
            let handle = Arc::clone(&handle);
            async move { Ok(handle) }
        }));
        connection.set(Some(queue));
        connection
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn set(&self, queue: Option<Arc<dyn JobQueue>>) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = queue;
    }

    pub fn is_connected(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// The live queue handle.
    pub fn current(&self) -> Result<Arc<dyn JobQueue>, QueueError> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(QueueError::Unavailable)
    }

    /// Drop the handle after a connection-level failure.
    pub fn mark_lost(&self) {
        if self.is_connected() {
            tracing::warn!("Queue connection lost");
        }
        self.set(None);
    }

    /// Publish on the live connection, failing fast when it is down.
    pub async fn publish(&self, payload: &[u8]) -> Result<DbId, QueueError> {
        let queue = self.current()?;
        queue.publish(payload).await.inspect_err(|e| {
            if e.is_connection_lost() {
                self.mark_lost();
            }
        })
    }

    /// Keep the connection up until `cancel` fires. For publishers that have
    /// no consume loop of their own.
    pub async fn supervise(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            if !self.is_connected() && !self.reconnect(&cancel).await {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }
    }

    /// Retry the connector until it succeeds or `cancel` fires.
    ///
    /// Returns `false` when cancelled.
    pub async fn reconnect(&self, cancel: &CancellationToken) -> bool {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Queue reconnect cancelled");
                    return false;
                }
                result = (self.connector)() => match result {
                    Ok(queue) => {
                        self.set(Some(queue));
                        tracing::info!(attempt, "Queue connected");
                        return true;
                    }
                    Err(e) => {
                        tracing::warn!(
                            attempt,
                            error = %e,
                            delay_ms = self.backoff.as_millis() as u64,
                            "Queue connection failed, retrying",
                        );
                    }
                },
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Queue reconnect cancelled");
                    return false;
                }
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }
    }
}
