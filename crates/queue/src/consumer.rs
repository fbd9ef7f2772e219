use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use beacon_slack::{registry::DispatchError, SlackMessage};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    channel::LocalQueueReceiver,
    message::{QueuedMessage, SLACK_QUEUE_GROUP},
};

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("queue message {message_id} is not valid json: {source}")]
    Decode {
        message_id: Uuid,
        #[source]
        source: serde_json::Error,
    },
    #[error("queue message {message_id} failed: {source}")]
    Handler {
        message_id: Uuid,
        #[source]
        source: DispatchError,
    },
}

/// Top-level handling of one classified message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(
        &self,
        message: &SlackMessage,
        correlation_id: &str,
    ) -> Result<(), DispatchError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    Handled,
    Skipped,
}

/// Turns queue records into handler calls. Owns no retry logic.
pub struct QueueConsumer {
    handler: Arc<dyn MessageHandler>,
    group_id: String,
}

impl QueueConsumer {
    pub fn new(handler: Arc<dyn MessageHandler>) -> Self {
        Self { handler, group_id: SLACK_QUEUE_GROUP.to_owned() }
    }

    pub async fn handle_record(
        &self,
        record: &QueuedMessage,
    ) -> Result<RecordOutcome, ConsumerError> {
        if record.group_id != self.group_id {
            debug!(
                event_name = "queue.record.skipped",
                message_id = %record.id,
                group_id = %record.group_id,
                "record belongs to another group"
            );
            return Ok(RecordOutcome::Skipped);
        }

        let body: Value = serde_json::from_str(&record.body).map_err(|source| {
            error!(
                event_name = "queue.record.decode_failed",
                message_id = %record.id,
                error = %source,
                "queued body is not valid json"
            );
            ConsumerError::Decode { message_id: record.id, source }
        })?;

        let message = SlackMessage::classify(&body);
        let correlation_id = record.id.to_string();
        debug!(
            event_name = "queue.record.received",
            message_id = %record.id,
            kind = message.kind(),
            "handling queued message"
        );

        self.handler.handle_message(&message, &correlation_id).await.map_err(|source| {
            error!(
                event_name = "queue.record.failed",
                message_id = %record.id,
                kind = message.kind(),
                error = %source,
                detail = ?source,
                "queued message handler failed"
            );
            ConsumerError::Handler { message_id: record.id, source }
        })?;

        Ok(RecordOutcome::Handled)
    }

    /// Handles a delivered batch in order, stopping at the first failure.
    pub async fn handle_batch(&self, records: &[QueuedMessage]) -> Result<usize, ConsumerError> {
        let mut handled = 0;
        for record in records {
            if self.handle_record(record).await? == RecordOutcome::Handled {
                handled += 1;
            }
        }
        Ok(handled)
    }
}

/// How the in-process lane redelivers a record whose handling failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedeliveryPolicy {
    pub max_receives: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RedeliveryPolicy {
    fn default() -> Self {
        Self { max_receives: 3, base_delay_ms: 500, max_delay_ms: 10_000 }
    }
}

impl RedeliveryPolicy {
    fn backoff(&self, receive: u32) -> Duration {
        let exponent = receive.min(16);
        let delay_ms = self.base_delay_ms.saturating_mul(1_u64 << exponent).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub handled: usize,
    pub skipped: usize,
    pub dead_lettered: usize,
}

/// Drains the local lane one record at a time.
///
/// A failed record is redelivered in place, keeping lane order, until it
/// exceeds `max_receives`; it is then dead-lettered to the error log.
pub struct QueueWorker {
    consumer: QueueConsumer,
    policy: RedeliveryPolicy,
}

impl QueueWorker {
    pub fn new(consumer: QueueConsumer, policy: RedeliveryPolicy) -> Self {
        Self { consumer, policy }
    }

    pub async fn run(&self, mut receiver: LocalQueueReceiver) -> WorkerStats {
        info!(event_name = "queue.worker.started", queue = receiver.name(), "queue worker started");
        let mut stats = WorkerStats::default();

        while let Some(record) = receiver.recv().await {
            self.deliver(&record, &mut stats).await;
        }

        info!(
            event_name = "queue.worker.stopped",
            queue = receiver.name(),
            handled = stats.handled,
            skipped = stats.skipped,
            dead_lettered = stats.dead_lettered,
            "queue lane closed"
        );
        stats
    }

    async fn deliver(&self, record: &QueuedMessage, stats: &mut WorkerStats) {
        for receive in 1..=self.policy.max_receives.max(1) {
            match self.consumer.handle_record(record).await {
                Ok(RecordOutcome::Handled) => {
                    stats.handled += 1;
                    return;
                }
                Ok(RecordOutcome::Skipped) => {
                    stats.skipped += 1;
                    return;
                }
                Err(ConsumerError::Decode { .. }) => break,
                Err(error) if receive < self.policy.max_receives => {
                    warn!(
                        event_name = "queue.record.redelivery",
                        message_id = %record.id,
                        receive,
                        max_receives = self.policy.max_receives,
                        error = %error,
                        "redelivering failed record"
                    );
                    let delay = self.policy.backoff(receive - 1);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(_) => break,
            }
        }

        stats.dead_lettered += 1;
        error!(
            event_name = "queue.record.dead_lettered",
            message_id = %record.id,
            body = %record.body,
            "record exhausted its deliveries"
        );
    }
}
