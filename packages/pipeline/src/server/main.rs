// Main entry point for the segment analysis pipeline

use std::sync::Arc;

use anyhow::{Context, Result};
use pipeline_core::kernel::jobs::{
    ExecutorConfig, JobExecutor, JobStore, RetryConfig, RetryManager, SchedulerConfig,
    SegmentScheduler, WorkerPool, WorkerPoolConfig,
};
use pipeline_core::kernel::{
    BaseResultNotifier, DetectorClient, FfmpegSegmentTransport, MediaRegistryClient, NoopNotifier,
    PipelineKernel, VisionAnalyzerClient, WebhookNotifier,
};
use pipeline_core::server::build_app;
use pipeline_core::Config;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pipeline_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Sightline segment analysis pipeline");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // External services
    let registry = Arc::new(MediaRegistryClient::new(
        config.media_registry_url.clone(),
        config.media_registry_token.clone(),
    ));
    let transport = Arc::new(FfmpegSegmentTransport::new(config.ffmpeg_path.clone()));
    let analyzer = Arc::new(VisionAnalyzerClient::new(
        config.vision_api_url.clone(),
        config.vision_api_key.clone(),
    ));
    let detector = Arc::new(DetectorClient::new(
        config.detector_api_url.clone(),
        config.detector_api_key.clone(),
    ));
    let notifier: Arc<dyn BaseResultNotifier> = match &config.result_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(NoopNotifier),
    };

    let kernel = Arc::new(PipelineKernel::new(
        pool.clone(),
        registry,
        transport,
        analyzer,
        detector,
        notifier,
    ));
    let store = JobStore::new(pool.clone());

    // Background services, coordinated only through the job store
    let shutdown = CancellationToken::new();

    let scheduler = SegmentScheduler::new(
        Arc::clone(&kernel),
        store.clone(),
        SchedulerConfig {
            interval: config.scheduler_interval,
            window_size_secs: config.window_size_secs,
            live_window_size_secs: config.live_window_size_secs,
        },
    );
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown.clone()));

    let retry_manager = RetryManager::new(
        store.clone(),
        RetryConfig {
            interval: config.retry_interval,
            max_attempts: config.max_attempts,
            backoff_base: config.backoff_base,
            processing_timeout: config.processing_timeout,
        },
    );
    let retry_handle = tokio::spawn(retry_manager.run(shutdown.clone()));

    let executor = Arc::new(JobExecutor::new(
        Arc::clone(&kernel),
        store.clone(),
        ExecutorConfig {
            max_attempts: config.max_attempts,
            segment_timeout: config.segment_timeout,
            analysis_timeout: config.analysis_timeout,
        },
    ));
    let worker_pool = WorkerPool::new(
        store,
        executor,
        WorkerPoolConfig {
            max_concurrent_jobs: config.max_concurrent_jobs,
            poll_interval: config.poll_interval,
            ..Default::default()
        },
    );
    let worker_handle = tokio::spawn(worker_pool.run(shutdown.clone()));

    // Health surface
    let app = build_app(pool);
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Health endpoint on http://{}/health", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    let server_shutdown = shutdown.clone();
    let server_handle = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "health server error");
        }
    });

    // Run until interrupted, then drain
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received, draining...");
    shutdown.cancel();

    let _ = tokio::join!(
        scheduler_handle,
        retry_handle,
        worker_handle,
        server_handle
    );
    tracing::info!("Pipeline stopped");

    Ok(())
}
