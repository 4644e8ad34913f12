//! AMQP publisher (RabbitMQ) on top of lapin.

use super::{PublishError, QueueEnvelope, QueuePublisher};
use crate::config::BrokerConfig;
use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, timeout_at, Instant};

const CONNECTION_NAME: &str = "aloy-core";
const PERSISTENT: u8 = 2;
const REPLY_SUCCESS: u16 = 200;

/// Process-wide broker connection. Opened once at startup, shared for channel creation, closed at shutdown.
#[derive(Clone)]
pub struct BrokerConnection {
    inner: Arc<Connection>,
}

impl BrokerConnection {
    pub async fn connect(uri: &str) -> Result<Self, lapin::Error> {
        let properties = ConnectionProperties::default()
            .with_connection_name(CONNECTION_NAME.to_string().into());
        let conn = Connection::connect(uri, properties).await?;
        log::info!("broker: connected");
        Ok(Self {
            inner: Arc::new(conn),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.inner.status().connected()
    }

    pub async fn close(&self) -> Result<(), lapin::Error> {
        if !self.is_connected() {
            return Ok(());
        }
        self.inner.close(REPLY_SUCCESS, "shutdown").await
    }

    async fn create_channel(&self) -> Result<Channel, lapin::Error> {
        self.inner.create_channel().await
    }
}

/// Publishes each envelope on its own short-lived channel over the shared connection.
#[derive(Clone)]
pub struct AmqpPublisher {
    connection: BrokerConnection,
    publish_timeout: Duration,
    confirms: bool,
}

impl AmqpPublisher {
    pub fn new(connection: BrokerConnection, config: &BrokerConfig) -> Self {
        Self {
            connection,
            publish_timeout: config.publish_timeout(),
            confirms: config.confirms,
        }
    }

    async fn publish_on(&self, channel: &Channel, envelope: &QueueEnvelope) -> Result<(), PublishError> {
        let queue = envelope.queue.as_str();
        channel
            .queue_declare(queue, declare_options(), FieldTable::default())
            .await
            .map_err(|e| PublishError::Declare {
                queue: queue.to_string(),
                reason: e.to_string(),
            })?;
        if self.confirms {
            channel
                .confirm_select(ConfirmSelectOptions::default())
                .await
                .map_err(|e| PublishError::Channel(e.to_string()))?;
        }

        match self.send(channel, envelope).await {
            Ok(confirmation) if confirmation.is_nack() => Err(PublishError::Nack(queue.to_string())),
            Ok(_) => Ok(()),
            Err(e) => Err(PublishError::Publish {
                queue: queue.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Publish on the default exchange (routing key = queue) and, with confirms on, wait for the ack.
    async fn send(&self, channel: &Channel, envelope: &QueueEnvelope) -> lapin::Result<Confirmation> {
        let properties = BasicProperties::default()
            .with_content_type(envelope.content_type.clone().into())
            .with_delivery_mode(PERSISTENT);
        let confirm = channel
            .basic_publish(
                "",
                &envelope.queue,
                BasicPublishOptions::default(),
                &envelope.body,
                properties,
            )
            .await?;
        if self.confirms {
            confirm.await
        } else {
            Ok(Confirmation::NotRequested)
        }
    }
}

#[async_trait]
impl QueuePublisher for AmqpPublisher {
    fn name(&self) -> &str {
        "amqp"
    }

    fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Channel open, declare, publish and confirm all share one deadline.
    async fn publish(&self, envelope: QueueEnvelope) -> Result<(), PublishError> {
        let deadline = Instant::now() + self.publish_timeout;
        let queue = envelope.queue.as_str();
        let channel = before(deadline, self.publish_timeout, queue, async {
            self.connection
                .create_channel()
                .await
                .map_err(|e| PublishError::Channel(e.to_string()))
        })
        .await?;
        let result = before(
            deadline,
            self.publish_timeout,
            queue,
            self.publish_on(&channel, &envelope),
        )
        .await;
        match timeout(self.publish_timeout, channel.close(REPLY_SUCCESS, "done")).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::debug!("broker: closing channel after publish to {}: {}", queue, e),
            Err(_) => log::debug!("broker: closing channel after publish to {} timed out", queue),
        }
        if result.is_ok() {
            log::info!(
                "broker: sent {} bytes to {}",
                envelope.body.len(),
                envelope.queue
            );
        }
        result
    }
}

/// Run one publish stage against the deadline shared by the whole publish.
async fn before<T, F>(deadline: Instant, limit: Duration, queue: &str, stage: F) -> Result<T, PublishError>
where
    F: Future<Output = Result<T, PublishError>>,
{
    timeout_at(deadline, stage)
        .await
        .unwrap_or_else(|_| {
            Err(PublishError::Timeout {
                queue: queue.to_string(),
                timeout: limit,
            })
        })
}

/// Queue declaration flags: durable, not exclusive, not auto-deleted. Redeclaring is a no-op on the broker.
pub(crate) fn declare_options() -> QueueDeclareOptions {
    QueueDeclareOptions {
        passive: false,
        durable: true,
        exclusive: false,
        auto_delete: false,
        nowait: false,
    }
}
