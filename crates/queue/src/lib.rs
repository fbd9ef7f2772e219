//! Request queueing: the synchronous gateway that verifies, publishes and
//! acknowledges, and the asynchronous consumer that drains the lane.

pub mod channel;
pub mod consumer;
pub mod gateway;
pub mod message;

pub use channel::{local_queue, LocalQueuePublisher, LocalQueueReceiver, PublishError, QueuePublisher};
pub use consumer::{ConsumerError, MessageHandler, QueueConsumer, QueueWorker, RedeliveryPolicy};
pub use gateway::{GatewayError, GatewayResponse, QueueGateway, ResponseBody};
pub use message::QueuedMessage;
