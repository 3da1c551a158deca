//! Finished-pod notification producer and its unsent-message outbox.

mod fake;
mod message;
mod producer;

pub use fake::FakeMq;
pub use message::{PodFinishedMessage, QUEUE_NAME};
pub use producer::{Mq, MqError, UnsentMessageStore};
