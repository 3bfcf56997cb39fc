// PostgreSQL pool shared by the mission queries and the lock table

use crate::config::DatabaseConfig;
use crate::errors::DatabaseError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

#[derive(Debug, Clone)]
pub struct DbPool {
    pool: PgPool,
}

impl DbPool {
    /// Connect using `config`, failing fast when the database is unreachable
    #[instrument(skip(config), fields(
        max_connections = config.max_connections,
        min_connections = config.min_connections
    ))]
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(|e| {
                error!(error = %e, "Cannot reach the mission database");
                DatabaseError::ConnectionFailed(e.to_string())
            })?;

        info!("Mission database pool ready");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::HealthCheckFailed(e.to_string()))?;
        debug!("Mission database reachable");
        Ok(())
    }

    /// Wait for checked-out connections to return, then close them
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Mission database pool closed");
    }
}
