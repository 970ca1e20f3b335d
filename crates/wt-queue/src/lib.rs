//! Worktime Message Channel
//!
//! Durable pub/sub abstraction used for profile-change propagation:
//! - `QueuePublisher` / `QueueConsumer`: backend-neutral channel handles
//! - `InMemoryQueue`: in-process backend for development and tests
//! - `RabbitMqChannel`: AMQP backend (feature `rabbitmq`)
//! - `ConsumerRunner`: drives a handler with at most one message in flight

use async_trait::async_trait;
use thiserror::Error;
use wt_common::QueuedMessage;

pub mod consumer;
pub mod memory;

#[cfg(feature = "rabbitmq")]
pub mod rabbitmq;

pub use consumer::{ConsumerRunner, MessageHandler};
pub use memory::InMemoryQueue;

#[cfg(feature = "rabbitmq")]
pub use rabbitmq::{RabbitMqChannel, RabbitMqConsumer, RabbitMqPublisher, RabbitMqTopology};

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Unknown receipt handle: {0}")]
    UnknownReceipt(String),

    #[error("Queue closed: {0}")]
    Closed(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// Publishing side of a channel bound to one topic
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    fn identifier(&self) -> &str;

    /// Publish a payload, returning the message id assigned to it.
    ///
    /// Returns once the broker accepted the publish; it does not wait for a
    /// durability confirmation.
    async fn publish(&self, payload: Vec<u8>) -> Result<String>;
}

/// Consuming side of a channel bound to one topic.
///
/// Every received message must be settled with `ack` or `nack`; unsettled
/// messages stay redeliverable.
#[async_trait]
pub trait QueueConsumer: Send + Sync {
    fn identifier(&self) -> &str;

    /// Wait for the next message. `None` means the channel was closed.
    async fn receive(&self) -> Result<Option<QueuedMessage>>;

    async fn ack(&self, receipt_handle: &str) -> Result<()>;

    async fn nack(&self, receipt_handle: &str, requeue: bool) -> Result<()>;
}
