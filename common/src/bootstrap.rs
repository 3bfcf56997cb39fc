// Bootstrap utilities for binary initialization

use crate::clock::{Clock, SystemClock};
use crate::config::{LockBackend, Settings};
use crate::db::repositories::{PgAssetRepository, PgMissionRepository};
use crate::db::{DbPool, RedisPool};
use crate::enricher::NotificationEnricher;
use crate::lock::{instance_id, DistributedLock, PgLock, RedisLock};
use crate::queue::{EventPublisher, NatsClient, NatsEventPublisher};
use crate::scheduler::MissionSchedulerService;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Initialize database pool
///
/// # Errors
/// Returns error if database pool initialization fails
#[tracing::instrument(skip(settings))]
pub async fn init_database_pool(settings: &Settings) -> Result<DbPool> {
    info!("Initializing database pool");

    let db_pool = DbPool::new(&settings.database)
        .await
        .context("Failed to initialize database pool")?;

    info!("Database pool initialized");
    Ok(db_pool)
}

/// Connect to NATS and make sure both event streams exist
///
/// # Errors
/// Returns error if the connection or stream creation fails
#[tracing::instrument(skip(settings))]
pub async fn init_nats_client(settings: &Settings) -> Result<NatsClient> {
    info!("Initializing NATS client");

    let nats_client = NatsClient::new(settings.nats.clone(), settings.topics.clone())
        .await
        .context("Failed to initialize NATS client")?;
    nats_client
        .initialize_streams()
        .await
        .context("Failed to initialize NATS streams")?;

    info!("NATS client initialized");
    Ok(nats_client)
}

/// Build the lock backend selected by `lock.backend`
///
/// # Errors
/// Returns error if the Redis pool or the lock table cannot be initialized
#[tracing::instrument(skip(settings, db_pool))]
pub async fn init_lock(settings: &Settings, db_pool: DbPool) -> Result<Arc<dyn DistributedLock>> {
    let owner = instance_id();
    info!(backend = ?settings.lock.backend, owner = %owner, "Initializing distributed lock");

    let lock: Arc<dyn DistributedLock> = match settings.lock.backend {
        LockBackend::Postgres => {
            let lock = PgLock::new(db_pool, owner);
            lock.ensure_schema()
                .await
                .context("Failed to create lock table")?;
            Arc::new(lock)
        }
        LockBackend::Redis => {
            let redis_pool = RedisPool::new(&settings.redis)
                .await
                .context("Failed to initialize Redis pool")?;
            Arc::new(RedisLock::new(redis_pool, owner))
        }
    };

    info!("Distributed lock initialized");
    Ok(lock)
}

/// Wire repositories, enricher and publisher into the scheduling service
pub fn build_scheduler_service(
    settings: &Settings,
    db_pool: DbPool,
    nats_client: NatsClient,
) -> MissionSchedulerService {
    let publisher: Arc<dyn EventPublisher> = Arc::new(NatsEventPublisher::new(nats_client));
    let enricher = NotificationEnricher::new(
        Arc::new(PgAssetRepository::new(db_pool.clone())),
        settings.notification.fallback_recipient_email.clone(),
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    MissionSchedulerService::new(
        Arc::new(PgMissionRepository::new(db_pool)),
        Arc::new(enricher),
        publisher,
        clock,
        &settings.scheduler,
    )
}
