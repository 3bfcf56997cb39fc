// Mission scheduler binary entry point

use anyhow::{Context, Result};
use common::bootstrap;
use common::config::Settings;
use common::jobs::MissionSchedulerJobs;
use common::lock::LockingTaskExecutor;
use common::telemetry;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;

    telemetry::init_logging(
        &settings.observability.log_level,
        settings.observability.tracing_endpoint.as_deref(),
    )?;
    telemetry::init_metrics(settings.observability.metrics_port)?;

    info!(
        nats_url = %settings.nats.url,
        lock_backend = ?settings.lock.backend,
        preparation_notification_minutes = settings.scheduler.preparation_notification_minutes,
        "Starting UMAS mission scheduler"
    );

    let db_pool = bootstrap::init_database_pool(&settings).await?;
    let nats_client = bootstrap::init_nats_client(&settings).await?;
    let lock = bootstrap::init_lock(&settings, db_pool.clone()).await?;

    let service = bootstrap::build_scheduler_service(&settings, db_pool.clone(), nats_client);
    let jobs = Arc::new(
        MissionSchedulerJobs::new(Arc::new(service), LockingTaskExecutor::new(lock), &settings)
            .context("Failed to configure scheduler jobs")?,
    );

    let jobs_for_shutdown = jobs.clone();
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            error!(error = %e, "Failed to listen for shutdown signals");
        }
        info!("Shutdown signal received, stopping scheduler jobs");
        jobs_for_shutdown.shutdown();
    });

    jobs.start().await;

    db_pool.close().await;
    telemetry::shutdown_tracer();
    info!("Mission scheduler stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("Failed to listen for Ctrl+C")?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
    }
    Ok(())
}
