use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gigs_api::config::ServerConfig;
use gigs_api::router::build_app_router;
use gigs_api::state::AppState;
use gigs_cloud::StorageConfig;
use gigs_core::init_data::InitDataVerifier;
use gigs_events::bus::EventBus;
use gigs_events::calendar::{CalendarConfig, CalendarSync};
use gigs_pipeline::{PipelineConfig, ServiceDeps, Services};
use gigs_telegram::{BotApi, BotConfig};
use gigs_worker::{pg_connector, QueueConfig, QueueConnection};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gigs_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    let bot_config = BotConfig::from_env();
    let storage = StorageConfig::from_env();

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = gigs_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    gigs_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    gigs_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Event bus and calendar sync ---
    let bus = Arc::new(EventBus::default());
    let calendar_handle = tokio::spawn(
        CalendarSync::new(CalendarConfig::from_env()).run(bus.subscribe()),
    );

    // --- Pipeline ---
    let objects = gigs_cloud::build_store(&storage).await;
    let services = Services::build(ServiceDeps::postgres(
        pool.clone(),
        objects,
        Arc::new(BotApi::new(&bot_config)),
        Arc::clone(&bus),
        PipelineConfig::from_env(),
        storage.posters_prefix.clone(),
    ));

    // --- Submission queue ---
    let cancel = CancellationToken::new();
    let (queue, queue_handle) = if config.queue_submissions {
        let queue_config = QueueConfig::from_env();
        let name = format!("gigs-api-{}", uuid::Uuid::new_v4());
        let connection = Arc::new(QueueConnection::new(pg_connector(&queue_config, &name)));
        let handle = tokio::spawn(Arc::clone(&connection).supervise(cancel.clone()));
        tracing::info!(queue = %queue_config.queue, "Submissions go through the job queue");
        (Some(connection), Some(handle))
    } else {
        (None, None)
    };

    // --- App state ---
    let state = AppState {
        pool: Some(pool),
        config: Arc::new(config.clone()),
        verifier: Arc::new(InitDataVerifier::new(&bot_config.token)),
        webhook_secret: Arc::from(bot_config.webhook_secret.as_str()),
        services,
        queue,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    cancel.cancel();
    if let Some(handle) = queue_handle {
        let _ = tokio::time::timeout(grace, handle).await;
    }

    // Calendar sync stops once the last bus handle is gone.
    drop(bus);
    let _ = tokio::time::timeout(grace, calendar_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
