// Configuration management with layered configuration (file, env)

use crate::errors::ConfigurationError;
use crate::schedule::parse_cron_expression;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub nats: NatsConfig,
    pub topics: TopicsConfig,
    pub scheduler: SchedulerConfig,
    pub lock: LockSettings,
    pub notification: NotificationConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    /// Namespace of the lock keys
    #[serde(default = "default_redis_key_prefix")]
    pub key_prefix: String,
}

fn default_redis_key_prefix() -> String {
    "umas:scheduler:lock".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatsConfig {
    pub url: String,
    pub execution_stream: String,
    pub notification_stream: String,
    #[serde(default = "default_publish_timeout_seconds")]
    pub publish_timeout_seconds: u64,
    #[serde(default = "default_publish_max_retries")]
    pub publish_max_retries: u32,
}

fn default_publish_timeout_seconds() -> u64 {
    5
}

fn default_publish_max_retries() -> u32 {
    3
}

/// Topics the two event kinds are published to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsConfig {
    pub execute: String,
    pub notification: String,
}

/// Longest accepted preparation lead time: one week
pub const MAX_PREPARATION_NOTIFICATION_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Lead time of the drone preparation notification, in minutes
    pub preparation_notification_minutes: i64,
    /// Seconds-first cron expression triggering ScheduleReadyMissions
    pub mission_execution_cron: String,
    /// Seconds-first cron expression triggering NotifyUpcomingMissions
    pub preparation_notification_cron: String,
    /// Upper bound on concurrent enrich/publish tasks per batch
    #[serde(default = "default_max_concurrent_publishes")]
    pub max_concurrent_publishes: usize,
}

fn default_max_concurrent_publishes() -> usize {
    16
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LockBackend {
    Postgres,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockSettings {
    pub backend: LockBackend,
    pub schedule_missions: LockDurations,
    pub notify_upcoming_missions: LockDurations,
}

/// Lease bounds of one named lock
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LockDurations {
    pub lock_at_most_for_seconds: u64,
    pub lock_at_least_for_seconds: u64,
}

impl LockDurations {
    pub fn lock_at_most_for(&self) -> Duration {
        Duration::from_secs(self.lock_at_most_for_seconds)
    }

    pub fn lock_at_least_for(&self) -> Duration {
        Duration::from_secs(self.lock_at_least_for_seconds)
    }

    fn validate(&self, name: &str) -> Result<(), String> {
        if self.lock_at_most_for_seconds == 0 {
            return Err(format!("Lock '{}' lock_at_most_for must be greater than 0", name));
        }
        if self.lock_at_least_for_seconds > self.lock_at_most_for_seconds {
            return Err(format!(
                "Lock '{}' lock_at_least_for ({}s) cannot exceed lock_at_most_for ({}s)",
                name, self.lock_at_least_for_seconds, self.lock_at_most_for_seconds
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Recipient used when the mission operator cannot be resolved
    pub fallback_recipient_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub metrics_port: u16,
    pub tracing_endpoint: Option<String>,
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigurationError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigurationError> {
        let config_dir = config_dir.as_ref();
        let defaults = Config::try_from(&Settings::default())?;

        let builder = Config::builder()
            // Start with default configuration
            .add_source(defaults)
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |msg: &str| Err(ConfigurationError::Invalid(msg.to_string()));

        if self.database.url.is_empty() {
            return invalid("Database URL cannot be empty");
        }
        if self.database.max_connections == 0 {
            return invalid("Database max_connections must be greater than 0");
        }

        if self.lock.backend == LockBackend::Redis && self.redis.url.is_empty() {
            return invalid("Redis URL cannot be empty when the redis lock backend is selected");
        }

        if self.nats.url.is_empty() {
            return invalid("NATS URL cannot be empty");
        }
        if self.nats.execution_stream.is_empty() || self.nats.notification_stream.is_empty() {
            return invalid("NATS stream names cannot be empty");
        }
        if self.nats.execution_stream == self.nats.notification_stream {
            return invalid("NATS execution and notification streams must differ");
        }
        if self.nats.publish_timeout_seconds == 0 {
            return invalid("NATS publish_timeout_seconds must be greater than 0");
        }

        if self.topics.execute.trim().is_empty() || self.topics.notification.trim().is_empty() {
            return invalid("Topics cannot be empty");
        }
        if self.topics.execute == self.topics.notification {
            return invalid("Execution and notification topics must differ");
        }

        if self.scheduler.preparation_notification_minutes <= 0 {
            return invalid("Scheduler preparation_notification_minutes must be greater than 0");
        }
        if self.scheduler.preparation_notification_minutes > MAX_PREPARATION_NOTIFICATION_MINUTES {
            return invalid("Scheduler preparation_notification_minutes cannot exceed one week (10080)");
        }
        if self.scheduler.max_concurrent_publishes == 0 {
            return invalid("Scheduler max_concurrent_publishes must be greater than 0");
        }
        parse_cron_expression(&self.scheduler.mission_execution_cron)?;
        parse_cron_expression(&self.scheduler.preparation_notification_cron)?;

        self.lock
            .schedule_missions
            .validate("scheduleMissions")
            .map_err(ConfigurationError::Invalid)?;
        self.lock
            .notify_upcoming_missions
            .validate("notifyUpcomingMissions")
            .map_err(ConfigurationError::Invalid)?;

        if self.notification.fallback_recipient_email.trim().is_empty() {
            return invalid("Notification fallback_recipient_email cannot be empty");
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/umas".to_string(),
                max_connections: 10,
                min_connections: 2,
                connect_timeout_seconds: 30,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                key_prefix: default_redis_key_prefix(),
            },
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                execution_stream: "UMAS_MISSION_EXECUTE".to_string(),
                notification_stream: "UMAS_DRON_PREPARATION".to_string(),
                publish_timeout_seconds: default_publish_timeout_seconds(),
                publish_max_retries: default_publish_max_retries(),
            },
            topics: TopicsConfig {
                execute: "umas.mission.execute".to_string(),
                notification: "umas.dron.preparation.notification".to_string(),
            },
            scheduler: SchedulerConfig {
                preparation_notification_minutes: 30,
                mission_execution_cron: "0 * * * * *".to_string(),
                preparation_notification_cron: "0 * * * * *".to_string(),
                max_concurrent_publishes: default_max_concurrent_publishes(),
            },
            lock: LockSettings {
                backend: LockBackend::Postgres,
                schedule_missions: LockDurations {
                    lock_at_most_for_seconds: 120,
                    lock_at_least_for_seconds: 30,
                },
                notify_upcoming_missions: LockDurations {
                    lock_at_most_for_seconds: 240,
                    lock_at_least_for_seconds: 55,
                },
            },
            notification: NotificationConfig {
                fallback_recipient_email: "no-reply@umas.co".to_string(),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                metrics_port: 9090,
                tracing_endpoint: None,
            },
        }
    }
}
