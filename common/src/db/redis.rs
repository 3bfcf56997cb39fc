// Shared Redis handle for the Redis lock backend

use crate::config::RedisConfig;
use crate::errors::StorageError;
use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

/// Multiplexed Redis connection plus the namespace lock keys live under
#[derive(Clone)]
pub struct RedisPool {
    manager: ConnectionManager,
    key_prefix: String,
}

impl RedisPool {
    #[instrument(skip(config), fields(redis_url = %config.url, key_prefix = %config.key_prefix))]
    pub async fn new(config: &RedisConfig) -> Result<Self, StorageError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| StorageError::ConnectionFailed(format!("Invalid Redis URL: {}", e)))?;

        // The manager reconnects on its own; clones share one multiplexed connection
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| StorageError::ConnectionFailed(format!("Redis unreachable: {}", e)))?;

        info!("Connected to Redis lock store");
        Ok(Self {
            manager,
            key_prefix: config.key_prefix.clone(),
        })
    }

    pub fn get_connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Redis key holding the named lock
    pub fn lock_key(&self, name: &str) -> String {
        lock_key(&self.key_prefix, name)
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), StorageError> {
        let mut conn = self.get_connection();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(StorageError::RedisError(format!("Unexpected PING reply: {}", pong)));
        }
        Ok(())
    }
}

fn lock_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches(':');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}:{}", prefix, name)
    }
}
