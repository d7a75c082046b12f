use std::sync::Arc;

use gigs_core::init_data::InitDataVerifier;
use gigs_pipeline::Services;
use gigs_worker::QueueConnection;

use crate::config::ServerConfig;

/// Shared application state available to all handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Database pool, when the server runs against PostgreSQL.
    pub pool: Option<gigs_db::DbPool>,
    pub config: Arc<ServerConfig>,
    pub services: Services,
    /// Checks submission init data against the bot token.
    pub verifier: Arc<InitDataVerifier>,
    /// Expected value of the webhook secret header.
    pub webhook_secret: Arc<str>,
    /// Job queue for deferred submissions.
    pub queue: Option<Arc<QueueConnection>>,
}
