// Queue module for NATS JetStream integration

pub mod nats;
pub mod publisher;

pub use nats::NatsClient;
pub use publisher::{
    DronePreparationMessage, EventPublisher, MissionExecutionMessage, NatsEventPublisher,
};
