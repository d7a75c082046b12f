use std::sync::Arc;
use std::time::Duration;

use gigs_cloud::StorageConfig;
use gigs_events::bus::EventBus;
use gigs_pipeline::{PipelineConfig, ServiceDeps, Services};
use gigs_telegram::{BotApi, BotConfig};
use gigs_worker::{pg_connector, GigJobConsumer, QueueConfig, QueueConnection};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gigs_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let queue_config = QueueConfig::from_env();
    if !queue_config.consume_enabled {
        tracing::info!("MQ_CONSUME_ENABLED is off, worker exiting");
        return;
    }

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = gigs_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    gigs_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    gigs_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    // --- Pipeline ---
    let bot = Arc::new(BotApi::new(&BotConfig::from_env()));
    let storage = StorageConfig::from_env();
    let objects = gigs_cloud::build_store(&storage).await;
    let services = Services::build(ServiceDeps::postgres(
        pool,
        objects,
        bot,
        Arc::new(EventBus::default()),
        PipelineConfig::from_env(),
        storage.posters_prefix.clone(),
    ));

    // --- Consumer ---
    let consumer_name = format!("gigs-worker-{}", uuid::Uuid::new_v4());
    let connection = Arc::new(QueueConnection::new(pg_connector(&queue_config, &consumer_name)));
    let consumer = GigJobConsumer::new(
        connection,
        services.submissions.clone(),
        queue_config.prefetch,
        queue_config.poll_interval,
    );
    tracing::info!(
        consumer = %consumer_name,
        queue = %queue_config.queue,
        prefetch = queue_config.prefetch,
        "Worker starting"
    );

    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let handle = tokio::spawn(async move { consumer.run(run_cancel).await });

    shutdown_signal().await;
    cancel.cancel();
    if tokio::time::timeout(Duration::from_secs(30), handle).await.is_err() {
        tracing::warn!("Consumer did not stop in time");
    }
    tracing::info!("Worker stopped");
}

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
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
