// Error handling framework
// One enum per concern; infrastructure errors carry the message of their source.

use chrono::NaiveDateTime;
use thiserror::Error;

/// Database-specific errors raised by the query layer
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid row in {table}: {reason}")]
    InvalidRow { table: String, reason: String },
}

/// Storage errors raised by the lock backends
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Redis error: {0}")]
    RedisError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

/// Queue-related errors
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to connect to queue: {0}")]
    Connection(String),

    #[error("Failed to create stream: {0}")]
    StreamCreation(String),

    #[error("Failed to publish message: {0}")]
    PublishFailed(String),

    #[error("Message serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Health check failed: {0}")]
    HealthCheck(String),

    #[error("Queue operation timeout: {0}")]
    Timeout(String),
}

impl QueueError {
    /// Whether the broker client may retry the publish
    ///
    /// Serialization failures are deterministic, retrying them only repeats the error.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, QueueError::SerializationFailed(_))
    }

    /// Short label used as a metric dimension
    pub fn kind(&self) -> &'static str {
        match self {
            QueueError::Connection(_) => "connection",
            QueueError::StreamCreation(_) => "stream_creation",
            QueueError::PublishFailed(_) => "transport",
            QueueError::SerializationFailed(_) => "serialization",
            QueueError::HealthCheck(_) => "health_check",
            QueueError::Timeout(_) => "timeout",
        }
    }
}

/// Domain event construction errors
///
/// These are programmer errors: an event missing a required field is never retried.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },
}

/// Enrichment failed because a lookup hit an infrastructure error
#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("Lookup failed for mission {mission_id}: {source}")]
    Lookup {
        mission_id: String,
        #[source]
        source: DatabaseError,
    },

    #[error("Invalid notification for mission {mission_id}: {source}")]
    Invalid {
        mission_id: String,
        #[source]
        source: ValidationError,
    },
}

/// Failure of a single mission inside a fan-out batch
#[derive(Error, Debug)]
pub enum MissionFailure {
    #[error(transparent)]
    Enrichment(#[from] EnrichmentError),

    #[error(transparent)]
    Publish(#[from] QueueError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl MissionFailure {
    /// Short label used as a metric dimension
    pub fn kind(&self) -> &'static str {
        match self {
            MissionFailure::Enrichment(_) => "enrichment",
            MissionFailure::Publish(e) => e.kind(),
            MissionFailure::Validation(_) => "validation",
        }
    }
}

/// Errors reported by the scheduler use-cases
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Mission query failed: {0}")]
    QueryFailed(#[from] DatabaseError),

    #[error("{failed} of {total} missions failed ({succeeded} succeeded); first failure for mission {first_mission_id}: {first_error}")]
    BatchFailed {
        total: usize,
        succeeded: usize,
        failed: usize,
        first_mission_id: String,
        first_error: String,
    },

    #[error("Lock error: {0}")]
    Lock(#[from] StorageError),

    #[error("No upcoming window {minutes_before_execution} minutes after {now}")]
    WindowOutOfRange {
        now: NaiveDateTime,
        minutes_before_execution: i64,
    },
}

/// Invalid scheduler configuration
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

// Implement From for common external errors
impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => DatabaseError::QueryFailed(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionFailed(err.to_string())
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::DatabaseError(err.to_string())
    }
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        StorageError::RedisError(err.to_string())
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::SerializationFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization_failure_is_not_retryable() {
        assert!(!QueueError::SerializationFailed("bad".into()).is_retryable());
        assert!(QueueError::PublishFailed("broken pipe".into()).is_retryable());
        assert!(QueueError::Timeout("5s".into()).is_retryable());
    }

    #[test]
    fn test_queue_error_kind() {
        assert_eq!(QueueError::PublishFailed("x".into()).kind(), "transport");
        assert_eq!(QueueError::SerializationFailed("x".into()).kind(), "serialization");
        assert_eq!(QueueError::Timeout("x".into()).kind(), "timeout");
    }

    #[test]
    fn test_batch_failed_display() {
        let err = SchedulerError::BatchFailed {
            total: 5,
            succeeded: 4,
            failed: 1,
            first_mission_id: "m-3".to_string(),
            first_error: "Failed to publish message: connection reset".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("1 of 5 missions failed"));
        assert!(msg.contains("m-3"));
    }

    #[test]
    fn test_enrichment_error_keeps_mission_context() {
        let err = EnrichmentError::Lookup {
            mission_id: "m-1".to_string(),
            source: DatabaseError::ConnectionFailed("refused".to_string()),
        };
        assert!(err.to_string().contains("m-1"));
        assert!(err.to_string().contains("refused"));
    }
}
