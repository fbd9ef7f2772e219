//! In-process queue: a single bounded `tokio::sync::mpsc` lane.
//!
//! One receiver means one consumer, so records are handled in publish order
//! and never concurrently.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::message::QueuedMessage;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("queue `{0}` is closed")]
    Closed(String),
}

#[async_trait]
pub trait QueuePublisher: Send + Sync {
    async fn publish(&self, message: QueuedMessage) -> Result<(), PublishError>;

    /// `false` once no consumer can receive new messages.
    fn is_open(&self) -> bool {
        true
    }
}

#[derive(Clone, Debug)]
pub struct LocalQueuePublisher {
    name: String,
    sender: mpsc::Sender<QueuedMessage>,
}

pub struct LocalQueueReceiver {
    name: String,
    receiver: mpsc::Receiver<QueuedMessage>,
}

pub fn local_queue(
    name: impl Into<String>,
    capacity: usize,
) -> (LocalQueuePublisher, LocalQueueReceiver) {
    let name = name.into();
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (LocalQueuePublisher { name: name.clone(), sender }, LocalQueueReceiver { name, receiver })
}

impl LocalQueuePublisher {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl QueuePublisher for LocalQueuePublisher {
    async fn publish(&self, message: QueuedMessage) -> Result<(), PublishError> {
        let message_id = message.id;
        self.sender.send(message).await.map_err(|_| PublishError::Closed(self.name.clone()))?;
        debug!(
            event_name = "queue.message.published",
            queue = %self.name,
            message_id = %message_id,
            "published queue message"
        );
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }
}

impl LocalQueueReceiver {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next message, or `None` once every publisher is dropped.
    pub async fn recv(&mut self) -> Option<QueuedMessage> {
        self.receiver.recv().await
    }
}
