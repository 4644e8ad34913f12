//! Command routing: interpret a message, decode its payload, publish or reply.
//!
//! The routing table is the [`Command`] enum; adding a type means adding a variant (and a
//! payload decoder when it carries data) plus an arm in [`Dispatcher::route`].

use crate::broker::{
    PublishError, QueueEnvelope, QueuePublisher, ALARM_QUEUE, CONTENT_TYPE_JSON,
    CONTENT_TYPE_TEXT, LAMP_QUEUE,
};
use crate::command::{AlarmPayload, Command, DecodeError, LampPayload, RawCommand};
use crate::inbound::InboundMessage;
use crate::interpreter::{InterpretError, Interpreter};
use crate::reply;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome label returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    /// Command accepted (queued or acknowledged).
    Success,
    /// Immediate reply (conversation, search, lamp confirmation).
    Ok,
    /// Type not in the routing table; not a failure.
    Unknown,
}

/// `{ "status", "message" }` body returned for a handled message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub status: DispatchStatus,
    pub message: String,
}

impl DispatchResult {
    fn new(status: DispatchStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("empty message")]
    Validation,
    #[error(transparent)]
    Interpretation(#[from] InterpretError),
    #[error(transparent)]
    Decoding(#[from] DecodeError),
    #[error(transparent)]
    Infrastructure(#[from] PublishError),
}

impl DispatchError {
    /// True when the caller sent something unusable (as opposed to a server-side failure).
    pub fn is_client_error(&self) -> bool {
        matches!(self, DispatchError::Validation)
    }
}

/// Routes inbound messages. Cheap to share: holds only `Arc`ed collaborators.
#[derive(Clone)]
pub struct Dispatcher {
    interpreter: Arc<dyn Interpreter>,
    publisher: Arc<dyn QueuePublisher>,
}

impl Dispatcher {
    pub fn new(interpreter: Arc<dyn Interpreter>, publisher: Arc<dyn QueuePublisher>) -> Self {
        Self {
            interpreter,
            publisher,
        }
    }

    pub fn publisher(&self) -> &dyn QueuePublisher {
        self.publisher.as_ref()
    }

    /// Handle one message end to end. Nothing is published unless interpretation and decoding succeed.
    pub async fn dispatch(&self, msg: &InboundMessage) -> Result<DispatchResult, DispatchError> {
        if msg.is_empty() {
            return Err(DispatchError::Validation);
        }
        let raw = self.interpreter.interpret(&msg.text).await?;
        log::info!(
            "[{}] interpreted type: {} | message: {}",
            msg.request_id,
            raw.kind,
            raw.message
        );
        let command = Command::decode(&raw)?;
        let result = self.route(command, raw, &msg.request_id).await?;
        log::debug!("[{}] dispatch result: {:?}", msg.request_id, result.status);
        Ok(result)
    }

    async fn route(
        &self,
        command: Command,
        raw: RawCommand,
        request_id: &str,
    ) -> Result<DispatchResult, DispatchError> {
        let message = raw.message;
        let result = match command {
            Command::SetAlarm(alarm) => {
                self.publish_alarm(&alarm).await?;
                DispatchResult::new(DispatchStatus::Success, message)
            }
            Command::CancelAlarm | Command::CancelReminder => {
                log::info!("[{}] acknowledged {}", request_id, raw.kind);
                DispatchResult::new(DispatchStatus::Success, message)
            }
            Command::SetReminder => {
                log::info!("[{}] set_reminder is not implemented yet, ignoring", request_id);
                DispatchResult::new(DispatchStatus::Success, message)
            }
            Command::LampControl(lamp) => {
                self.publish_lamp(&lamp).await?;
                DispatchResult::new(DispatchStatus::Ok, reply::lamp_reply(&lamp))
            }
            Command::Conversation | Command::Search => {
                DispatchResult::new(DispatchStatus::Ok, message)
            }
            Command::Unknown { kind } => {
                log::warn!("[{}] unrecognised command type: {}", request_id, kind);
                DispatchResult::new(DispatchStatus::Unknown, message)
            }
        };
        Ok(result)
    }

    async fn publish_alarm(&self, alarm: &AlarmPayload) -> Result<(), PublishError> {
        let envelope = QueueEnvelope::json(ALARM_QUEUE, CONTENT_TYPE_TEXT, alarm)?;
        self.publisher.publish(envelope).await
    }

    async fn publish_lamp(&self, lamp: &LampPayload) -> Result<(), PublishError> {
        let envelope = QueueEnvelope::json(LAMP_QUEUE, CONTENT_TYPE_JSON, lamp)?;
        self.publisher.publish(envelope).await
    }
}
