// Mission event publisher for NATS JetStream

use crate::errors::QueueError;
use crate::models::{DronePreparationNotification, MissionExecutionEvent};
use crate::queue::nats::{mission_subject, NatsClient};
use crate::retry::{ExponentialBackoff, RetryStrategy};
use async_nats::jetstream::context::PublishAckFuture;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Header carrying the ordering key of every published event
pub const MISSION_ID_HEADER: &str = "Mission-Id";

/// Wire format of a mission execution event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionExecutionMessage {
    pub mission_id: String,
    pub name: String,
    pub scheduled_at: NaiveDateTime,
    pub published_at: NaiveDateTime,
}

impl From<&MissionExecutionEvent> for MissionExecutionMessage {
    fn from(event: &MissionExecutionEvent) -> Self {
        Self {
            mission_id: event.mission_id().to_string(),
            name: event.mission_name().to_string(),
            scheduled_at: event.scheduled_at(),
            published_at: event.published_at(),
        }
    }
}

/// Wire format of a drone preparation notification
///
/// The vehicle fields keep their camelCase names; downstream consumers read them that way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DronePreparationMessage {
    pub mission_id: String,
    pub mission_name: String,
    #[serde(rename = "vehicleId")]
    pub vehicle_id: String,
    #[serde(rename = "vehicleName")]
    pub vehicle_name: String,
    pub scheduled_execution_time: NaiveDateTime,
    pub minutes_before_execution: i64,
    pub published_at: NaiveDateTime,
    pub recipient_email: String,
}

impl From<&DronePreparationNotification> for DronePreparationMessage {
    fn from(notification: &DronePreparationNotification) -> Self {
        Self {
            mission_id: notification.mission_id().to_string(),
            mission_name: notification.mission_name().to_string(),
            vehicle_id: notification.vehicle_id().to_string(),
            vehicle_name: notification.vehicle_name().to_string(),
            scheduled_execution_time: notification.scheduled_execution_time(),
            minutes_before_execution: notification.minutes_before_execution(),
            published_at: notification.published_at(),
            recipient_email: notification.recipient_email().to_string(),
        }
    }
}

/// Publishing port for the two mission event kinds
///
/// Both operations return only after the broker acknowledged the message.
#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_execution(&self, event: &MissionExecutionEvent) -> Result<(), QueueError>;

    async fn publish_notification(
        &self,
        notification: &DronePreparationNotification,
    ) -> Result<(), QueueError>;
}

/// NATS-based event publisher
pub struct NatsEventPublisher {
    client: NatsClient,
    publish_timeout: Duration,
    retry: ExponentialBackoff,
}

impl NatsEventPublisher {
    /// Build a publisher using the timeout and retry budget of the client's config
    pub fn new(client: NatsClient) -> Self {
        let publish_timeout = Duration::from_secs(client.config().publish_timeout_seconds);
        let retry = ExponentialBackoff::new(client.config().publish_max_retries);
        Self {
            client,
            publish_timeout,
            retry,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: ExponentialBackoff) -> Self {
        self.retry = retry;
        self
    }

    /// Single publish attempt, waiting for the JetStream ack
    async fn publish_once(
        &self,
        subject: &str,
        mission_id: &str,
        payload: &[u8],
    ) -> Result<(), QueueError> {
        let mut headers = async_nats::HeaderMap::new();
        headers.insert(MISSION_ID_HEADER, mission_id);

        let publish_future: PublishAckFuture = self
            .client
            .jetstream()
            .publish_with_headers(subject.to_string(), headers, payload.to_vec().into())
            .await
            .map_err(|e| QueueError::PublishFailed(format!("Failed to publish message: {}", e)))?;

        match tokio::time::timeout(self.publish_timeout, publish_future).await {
            Ok(Ok(_ack)) => Ok(()),
            Ok(Err(e)) => Err(QueueError::PublishFailed(format!(
                "Failed to get publish acknowledgment: {}",
                e
            ))),
            Err(_) => Err(QueueError::Timeout(format!(
                "Publish acknowledgment timeout after {:?}",
                self.publish_timeout
            ))),
        }
    }

    async fn publish_with_retry(
        &self,
        topic: &str,
        mission_id: &str,
        payload: Vec<u8>,
    ) -> Result<(), QueueError> {
        let subject = mission_subject(topic, mission_id);
        let mut attempt = 0;

        loop {
            match self.publish_once(&subject, mission_id, &payload).await {
                Ok(()) => {
                    debug!(subject = %subject, attempt, "Broker acknowledged message");
                    return Ok(());
                }
                Err(e) if e.is_retryable() => match self.retry.next_delay(attempt) {
                    Some(delay) => {
                        warn!(
                            subject = %subject,
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Publish failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait::async_trait]
impl EventPublisher for NatsEventPublisher {
    #[instrument(skip(self, event), fields(mission_id = %event.mission_id()))]
    async fn publish_execution(&self, event: &MissionExecutionEvent) -> Result<(), QueueError> {
        let message = MissionExecutionMessage::from(event);
        let payload = serde_json::to_vec(&message)?;

        self.publish_with_retry(&self.client.topics().execute, &message.mission_id, payload)
            .await?;

        info!(
            topic = %self.client.topics().execute,
            mission_name = %message.name,
            scheduled_at = %message.scheduled_at,
            "Mission execution event published"
        );
        Ok(())
    }

    #[instrument(skip(self, notification), fields(mission_id = %notification.mission_id()))]
    async fn publish_notification(
        &self,
        notification: &DronePreparationNotification,
    ) -> Result<(), QueueError> {
        let message = DronePreparationMessage::from(notification);
        let payload = serde_json::to_vec(&message)?;

        self.publish_with_retry(
            &self.client.topics().notification,
            &message.mission_id,
            payload,
        )
        .await?;

        info!(
            topic = %self.client.topics().notification,
            vehicle_name = %message.vehicle_name,
            vehicle_id = %message.vehicle_id,
            scheduled_execution_time = %message.scheduled_execution_time,
            minutes_before_execution = message.minutes_before_execution,
            recipient_email = %message.recipient_email,
            "Drone preparation notification published"
        );
        Ok(())
    }
}
