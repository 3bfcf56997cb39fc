// Cluster-wide execution locks for the scheduled jobs
//
// A named lock is FREE or HELD until some instant. Acquisition is a single
// conditional write in the shared store. Release never frees the lock before
// `lock_at_least_for` has elapsed since acquisition.

use crate::db::{DbPool, RedisPool};
use crate::errors::StorageError;
use crate::telemetry;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Lease parameters of one named lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockConfiguration {
    pub name: String,
    /// Lease length; a crashed holder blocks the cluster at most this long
    pub lock_at_most_for: Duration,
    /// Minimum hold, even when the task finishes sooner
    pub lock_at_least_for: Duration,
}

impl LockConfiguration {
    pub fn new(
        name: impl Into<String>,
        lock_at_most_for: Duration,
        lock_at_least_for: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            lock_at_most_for,
            lock_at_least_for,
        }
    }
}

/// Identity written as the lock owner: `<hostname>-<uuid>`
pub fn instance_id() -> String {
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "unknown-host".to_string());
    format!("{}-{}", host, Uuid::new_v4())
}

/// Lock port shared by all backends
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Try to take the lock for `lock_at_most_for`; false when another holder has it
    async fn try_acquire(&self, config: &LockConfiguration) -> Result<bool, StorageError>;

    /// Give the lock back, keeping it held until `lock_at_least_for` after acquisition
    async fn release(&self, config: &LockConfiguration) -> Result<(), StorageError>;
}

// ============================================================================
// PostgreSQL
// ============================================================================

const CREATE_LOCK_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS shedlock (
        name VARCHAR(64) PRIMARY KEY,
        lock_until TIMESTAMP NOT NULL,
        locked_at TIMESTAMP NOT NULL,
        locked_by VARCHAR(255) NOT NULL
    )
"#;

const ACQUIRE_LOCK: &str = r#"
    INSERT INTO shedlock (name, lock_until, locked_at, locked_by)
    VALUES (
        $1,
        timezone('utc', now()) + $2::bigint * interval '1 millisecond',
        timezone('utc', now()),
        $3
    )
    ON CONFLICT (name) DO UPDATE
    SET lock_until = EXCLUDED.lock_until,
        locked_at = EXCLUDED.locked_at,
        locked_by = EXCLUDED.locked_by
    WHERE shedlock.lock_until <= timezone('utc', now())
"#;

const RELEASE_LOCK: &str = r#"
    UPDATE shedlock
    SET lock_until = GREATEST(
        timezone('utc', now()),
        locked_at + $2::bigint * interval '1 millisecond'
    )
    WHERE name = $1 AND locked_by = $3
"#;

/// Lock rows in a ShedLock-compatible table, evaluated against database time
pub struct PgLock {
    pool: DbPool,
    owner: String,
}

impl PgLock {
    pub fn new(pool: DbPool, owner: impl Into<String>) -> Self {
        Self {
            pool,
            owner: owner.into(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Create the lock table if it does not exist
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(CREATE_LOCK_TABLE)
            .execute(self.pool.pool())
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Failed to create lock table: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl DistributedLock for PgLock {
    #[instrument(skip(self, config), fields(lock_name = %config.name))]
    async fn try_acquire(&self, config: &LockConfiguration) -> Result<bool, StorageError> {
        let result = sqlx::query(ACQUIRE_LOCK)
            .bind(&config.name)
            .bind(millis(config.lock_at_most_for))
            .bind(&self.owner)
            .execute(self.pool.pool())
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Failed to acquire lock: {}", e)))?;

        let acquired = result.rows_affected() == 1;
        debug!(acquired, owner = %self.owner, "Lock acquisition attempted");
        Ok(acquired)
    }

    #[instrument(skip(self, config), fields(lock_name = %config.name))]
    async fn release(&self, config: &LockConfiguration) -> Result<(), StorageError> {
        let result = sqlx::query(RELEASE_LOCK)
            .bind(&config.name)
            .bind(millis(config.lock_at_least_for))
            .bind(&self.owner)
            .execute(self.pool.pool())
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Failed to release lock: {}", e)))?;

        if result.rows_affected() == 0 {
            warn!(owner = %self.owner, "Lock was no longer owned at release");
        }
        Ok(())
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

// ============================================================================
// Redis
// ============================================================================

/// Shortens the TTL of an owned key to what is left of the minimum hold, or deletes it.
/// ARGV: owner, lock_at_most_for ms, lock_at_least_for ms
const RELEASE_SCRIPT: &str = r#"
    if redis.call("get", KEYS[1]) ~= ARGV[1] then
        return 0
    end
    local ttl = redis.call("pttl", KEYS[1])
    local elapsed = tonumber(ARGV[2]) - ttl
    local remaining = tonumber(ARGV[3]) - elapsed
    if ttl > 0 and remaining > 0 then
        redis.call("pexpire", KEYS[1], remaining)
        return 2
    end
    return redis.call("del", KEYS[1])
"#;

/// Lock keys with a TTL in Redis
pub struct RedisLock {
    pool: RedisPool,
    owner: String,
}

impl RedisLock {
    pub fn new(pool: RedisPool, owner: impl Into<String>) -> Self {
        Self {
            pool,
            owner: owner.into(),
        }
    }
}

#[async_trait]
impl DistributedLock for RedisLock {
    #[instrument(skip(self, config), fields(lock_name = %config.name))]
    async fn try_acquire(&self, config: &LockConfiguration) -> Result<bool, StorageError> {
        let mut conn = self.pool.get_connection();

        // SET NX PX: set only when absent, with the lease as expiry
        let result: Option<String> = redis::cmd("SET")
            .arg(self.pool.lock_key(&config.name))
            .arg(&self.owner)
            .arg("NX")
            .arg("PX")
            .arg(millis(config.lock_at_most_for).max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::RedisError(format!("Failed to acquire lock: {}", e)))?;

        let acquired = result.is_some();
        debug!(acquired, owner = %self.owner, "Lock acquisition attempted");
        Ok(acquired)
    }

    #[instrument(skip(self, config), fields(lock_name = %config.name))]
    async fn release(&self, config: &LockConfiguration) -> Result<(), StorageError> {
        let mut conn = self.pool.get_connection();

        let result: i32 = redis::Script::new(RELEASE_SCRIPT)
            .key(self.pool.lock_key(&config.name))
            .arg(&self.owner)
            .arg(millis(config.lock_at_most_for))
            .arg(millis(config.lock_at_least_for))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StorageError::RedisError(format!("Failed to release lock: {}", e)))?;

        match result {
            0 => warn!(owner = %self.owner, "Lock was not owned or already expired"),
            2 => debug!("Lock kept until minimum hold elapses"),
            _ => debug!("Lock released"),
        }
        Ok(())
    }
}

// ============================================================================
// In-process
// ============================================================================

#[derive(Debug, Clone)]
struct HeldLock {
    locked_at: Instant,
    lock_until: Instant,
    locked_by: String,
}

/// Process-local lock table with the same lease rules as the shared backends
///
/// Each handle acts as one owner; `with_owner` gives another participant on the same table.
#[derive(Debug, Clone)]
pub struct InMemoryLock {
    locks: Arc<Mutex<HashMap<String, HeldLock>>>,
    owner: String,
}

impl InMemoryLock {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
            owner: owner.into(),
        }
    }

    /// Handle on the same lock table acting as `owner`
    pub fn with_owner(&self, owner: impl Into<String>) -> Self {
        Self {
            locks: self.locks.clone(),
            owner: owner.into(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Whether `name` is currently held
    pub fn is_held(&self, name: &str) -> bool {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .get(name)
            .map(|held| held.lock_until > Instant::now())
            .unwrap_or(false)
    }
}

#[async_trait]
impl DistributedLock for InMemoryLock {
    async fn try_acquire(&self, config: &LockConfiguration) -> Result<bool, StorageError> {
        let now = Instant::now();
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(held) = locks.get(&config.name) {
            if held.lock_until > now {
                return Ok(false);
            }
        }

        locks.insert(
            config.name.clone(),
            HeldLock {
                locked_at: now,
                lock_until: now + config.lock_at_most_for,
                locked_by: self.owner.clone(),
            },
        );
        Ok(true)
    }

    async fn release(&self, config: &LockConfiguration) -> Result<(), StorageError> {
        let now = Instant::now();
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());

        match locks.get_mut(&config.name) {
            Some(held) if held.locked_by == self.owner => {
                held.lock_until = now.max(held.locked_at + config.lock_at_least_for);
            }
            _ => warn!(owner = %self.owner, "Lock was no longer owned at release"),
        }
        Ok(())
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Runs tasks only while holding their named lock
#[derive(Clone)]
pub struct LockingTaskExecutor {
    lock: Arc<dyn DistributedLock>,
}

impl LockingTaskExecutor {
    pub fn new(lock: Arc<dyn DistributedLock>) -> Self {
        Self { lock }
    }

    /// Acquire, run and release
    ///
    /// Returns `Ok(None)` without running the task when another holder has the lock.
    #[instrument(skip(self, config, task), fields(lock_name = %config.name))]
    pub async fn run_locked<F, Fut, T>(
        &self,
        config: &LockConfiguration,
        task: F,
    ) -> Result<Option<T>, StorageError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = T> + Send,
        T: Send,
    {
        if !self.lock.try_acquire(config).await? {
            debug!("Lock held elsewhere, skipping run");
            telemetry::record_lock_skipped(&config.name);
            return Ok(None);
        }

        debug!("Lock acquired");
        let output = task().await;

        // An unreleased lock expires with its lease
        if let Err(e) = self.lock.release(config).await {
            warn!(error = %e, "Failed to release lock");
        } else {
            info!(
                lock_at_least_for_ms = millis(config.lock_at_least_for),
                "Lock released"
            );
        }

        Ok(Some(output))
    }
}
