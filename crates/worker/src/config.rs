use std::time::Duration;

use gigs_core::env::{env_bool, env_opt};

const DEFAULT_QUEUE: &str = "gigs.create";

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Queue database URL.
    pub url: String,
    pub queue: String,
    /// Maximum messages in flight per process.
    pub prefetch: usize,
    pub consume_enabled: bool,
    pub poll_interval: Duration,
    pub visibility_timeout_secs: i64,
}

impl QueueConfig {
    /// Defaults for a queue at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            queue: DEFAULT_QUEUE.to_string(),
            prefetch: 10,
            consume_enabled: true,
            poll_interval: Duration::from_millis(500),
            visibility_timeout_secs: 300,
        }
    }

    /// Load queue configuration from environment variables.
    ///
    /// | Env Var                      | Default          |
    /// |------------------------------|------------------|
    /// | `MQ_URL`                     | `DATABASE_URL`   |
    /// | `MQ_QUEUE`                   | `gigs.create`    |
    /// | `MQ_PREFETCH`                | `10`             |
    /// | `MQ_CONSUME_ENABLED`         | `true`           |
    /// | `MQ_POLL_INTERVAL_MS`        | `500`            |
    /// | `MQ_VISIBILITY_TIMEOUT_SECS` | `300`            |
    pub fn from_env() -> Self {
        let url = env_opt("MQ_URL")
            .or_else(|| env_opt("DATABASE_URL"))
            .expect("MQ_URL or DATABASE_URL must be set in the environment");

        let prefetch: usize = std::env::var("MQ_PREFETCH")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("MQ_PREFETCH must be a valid usize");
        assert!(prefetch > 0, "MQ_PREFETCH must be at least 1");

        let poll_interval_ms: u64 = std::env::var("MQ_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "500".into())
            .parse()
            .expect("MQ_POLL_INTERVAL_MS must be a valid u64");

        let visibility_timeout_secs: i64 = std::env::var("MQ_VISIBILITY_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("MQ_VISIBILITY_TIMEOUT_SECS must be a valid i64");

        Self {
            url,
            queue: env_opt("MQ_QUEUE").unwrap_or_else(|| DEFAULT_QUEUE.into()),
            prefetch,
            consume_enabled: env_bool("MQ_CONSUME_ENABLED", true),
            poll_interval: Duration::from_millis(poll_interval_ms),
            visibility_timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = QueueConfig::new("postgres://localhost/gigs");
        assert_eq!(config.queue, "gigs.create");
        assert_eq!(config.prefetch, 10);
        assert!(config.consume_enabled);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
    }
}
