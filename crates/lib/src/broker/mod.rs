//! Queue publishing: durable per-domain queues on a shared broker connection.
//!
//! [`QueuePublisher`] is what the dispatcher holds. [`AmqpPublisher`] publishes through a
//! process-wide [`BrokerConnection`]; [`MemoryPublisher`] records envelopes in-process.

mod amqp;
mod memory;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

pub use amqp::{AmqpPublisher, BrokerConnection};
pub use memory::MemoryPublisher;

/// Queue consumed by the alarm scheduler.
pub const ALARM_QUEUE: &str = "set_alarm";
/// Queue consumed by the lamp controller.
pub const LAMP_QUEUE: &str = "lamp_control";

pub const CONTENT_TYPE_TEXT: &str = "text/plain";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// A serialized message addressed to a named queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEnvelope {
    pub queue: String,
    pub body: Vec<u8>,
    pub content_type: String,
}

impl QueueEnvelope {
    /// JSON-encode `payload` for `queue`, tagged with `content_type`.
    pub fn json<T: Serialize>(
        queue: impl Into<String>,
        content_type: impl Into<String>,
        payload: &T,
    ) -> Result<Self, PublishError> {
        Ok(Self {
            queue: queue.into(),
            body: serde_json::to_vec(payload)?,
            content_type: content_type.into(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("serializing message: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("opening broker channel: {0}")]
    Channel(String),
    #[error("declaring queue {queue}: {reason}")]
    Declare { queue: String, reason: String },
    #[error("publishing to {queue}: {reason}")]
    Publish { queue: String, reason: String },
    #[error("broker rejected message for {0}")]
    Nack(String),
    #[error("publishing to {queue} did not complete within {timeout:?}")]
    Timeout { queue: String, timeout: Duration },
    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

/// Delivers envelopes to durably-declared queues.
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    /// Short name for health output (e.g. "amqp").
    fn name(&self) -> &str;

    /// Whether the underlying broker connection is usable.
    fn is_connected(&self) -> bool;

    /// Declare `envelope.queue` if absent and publish the body to it.
    async fn publish(&self, envelope: QueueEnvelope) -> Result<(), PublishError>;
}
