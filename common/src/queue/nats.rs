// NATS JetStream client for the mission event streams

use crate::config::{NatsConfig, TopicsConfig};
use crate::errors::QueueError;
use async_nats::jetstream::{
    stream::{Config as StreamConfig, RetentionPolicy, Stream},
    Context as JetStreamContext,
};
use std::time::Duration;
use tracing::{info, instrument};

/// Events older than this are dropped from the streams
const STREAM_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Subject filter matching every mission key under a topic
pub fn topic_filter(topic: &str) -> String {
    format!("{}.>", topic)
}

/// Subject carrying one mission's event; the mission id acts as the ordering key
pub fn mission_subject(topic: &str, mission_id: &str) -> String {
    format!("{}.{}", topic, mission_id)
}

/// NATS JetStream client
pub struct NatsClient {
    client: async_nats::Client,
    jetstream: JetStreamContext,
    config: NatsConfig,
    topics: TopicsConfig,
}

impl NatsClient {
    /// Create a NatsClient from an existing async_nats::Client
    pub fn from_client(client: async_nats::Client, config: NatsConfig, topics: TopicsConfig) -> Self {
        let jetstream = async_nats::jetstream::new(client.clone());
        Self {
            client,
            jetstream,
            config,
            topics,
        }
    }

    /// Connect to the NATS server
    #[instrument(skip(config, topics), fields(url = %config.url))]
    pub async fn new(config: NatsConfig, topics: TopicsConfig) -> Result<Self, QueueError> {
        info!("Connecting to NATS server");

        let client = async_nats::connect(&config.url)
            .await
            .map_err(|e| QueueError::Connection(format!("Failed to connect to NATS: {}", e)))?;

        info!("Connected to NATS server successfully");
        Ok(Self::from_client(client, config, topics))
    }

    /// Create or get the execution and notification streams
    #[instrument(skip(self))]
    pub async fn initialize_streams(&self) -> Result<(), QueueError> {
        self.ensure_stream(&self.config.execution_stream, &self.topics.execute)
            .await?;
        self.ensure_stream(&self.config.notification_stream, &self.topics.notification)
            .await?;
        Ok(())
    }

    async fn ensure_stream(&self, name: &str, topic: &str) -> Result<Stream, QueueError> {
        info!(stream_name = %name, topic = %topic, "Initializing JetStream stream");

        let stream_config = StreamConfig {
            name: name.to_string(),
            subjects: vec![topic_filter(topic)],
            // Downstream services own their consumers
            retention: RetentionPolicy::Limits,
            max_age: STREAM_MAX_AGE,
            ..Default::default()
        };

        let stream = self
            .jetstream
            .get_or_create_stream(stream_config)
            .await
            .map_err(|e| {
                QueueError::StreamCreation(format!("Failed to create stream {}: {}", name, e))
            })?;

        info!(stream_name = %name, "Stream initialized successfully");
        Ok(stream)
    }

    pub fn jetstream(&self) -> &JetStreamContext {
        &self.jetstream
    }

    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    pub fn config(&self) -> &NatsConfig {
        &self.config
    }

    pub fn topics(&self) -> &TopicsConfig {
        &self.topics
    }

    /// Verify both streams are reachable
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), QueueError> {
        for stream in [&self.config.execution_stream, &self.config.notification_stream] {
            self.jetstream
                .get_stream(stream)
                .await
                .map_err(|e| QueueError::HealthCheck(format!("Stream {} unavailable: {}", stream, e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mission_subject_appends_key() {
        assert_eq!(
            mission_subject("umas.mission.execute", "m-42"),
            "umas.mission.execute.m-42"
        );
    }

    #[test]
    fn test_topic_filter_matches_mission_subjects() {
        assert_eq!(
            topic_filter("umas.dron.preparation.notification"),
            "umas.dron.preparation.notification.>"
        );
    }

    #[tokio::test]
    #[ignore] // Requires a running NATS server with JetStream
    async fn test_initialize_streams() {
        let settings = crate::config::Settings::default();
        let client = NatsClient::new(settings.nats, settings.topics).await.unwrap();
        client.initialize_streams().await.unwrap();
        client.health_check().await.unwrap();
    }
}
