use async_trait::async_trait;
use thiserror::Error;

use crate::message::PodFinishedMessage;

#[derive(Debug, Error)]
pub enum MqError {
    #[error("producer channel unavailable")]
    Unavailable,
}

/// Publishes finished-pod notifications to the downstream scheduler.
/// Only an in-memory double is provided; a real SQS/AMQP-backed producer
/// is out of scope, matching the trait-only treatment of every external
/// system this starter talks to.
#[async_trait]
pub trait Mq: Send + Sync {
    async fn publish_pod_finished(&self, message: PodFinishedMessage) -> Result<(), MqError>;
}

/// Persists messages that couldn't be published before shutdown so they
/// can be handed back to the producer on the next startup, matching
/// `IUnsentMessages.save_unsent_messages`/`load_unsent_messages`.
#[async_trait]
pub trait UnsentMessageStore: Send + Sync {
    async fn save_unsent(&self, messages: Vec<PodFinishedMessage>) -> Result<(), MqError>;
    async fn load_unsent(&self) -> Result<Vec<PodFinishedMessage>, MqError>;
}
