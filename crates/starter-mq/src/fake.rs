use std::sync::Mutex;

use async_trait::async_trait;

use crate::message::PodFinishedMessage;
use crate::producer::{Mq, MqError};

/// In-memory [`Mq`] used by tests and as the outbox a real producer would
/// drain into on shutdown. `set_up`/`set_down` simulate the broker
/// connection dropping so callers can exercise the outbox path.
pub struct FakeMq {
    published: Mutex<Vec<PodFinishedMessage>>,
    outbox: Mutex<Vec<PodFinishedMessage>>,
    up: std::sync::atomic::AtomicBool,
}

impl FakeMq {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            outbox: Mutex::new(Vec::new()),
            up: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub fn set_down(&self) {
        self.up.store(false, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn set_up(&self) {
        self.up.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<PodFinishedMessage> {
        self.published.lock().unwrap().clone()
    }

    /// Drains everything buffered for redelivery, as `export_unsent_messages`
    /// does at shutdown.
    pub fn export_unsent(&self) -> Vec<PodFinishedMessage> {
        std::mem::take(&mut self.outbox.lock().unwrap())
    }

    /// Re-queues previously-saved messages, as `import_unsent_messages` does
    /// at startup.
    pub fn import_unsent(&self, messages: Vec<PodFinishedMessage>) {
        self.outbox.lock().unwrap().extend(messages);
    }
}

impl Default for FakeMq {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mq for FakeMq {
    async fn publish_pod_finished(&self, message: PodFinishedMessage) -> Result<(), MqError> {
        if !self.up.load(std::sync::atomic::Ordering::SeqCst) {
            self.outbox.lock().unwrap().push(message);
            return Err(MqError::Unavailable);
        }

        self.published.lock().unwrap().push(message);
        Ok(())
    }
}
