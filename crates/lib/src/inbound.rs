//! Inbound message: one natural-language request submitted for dispatch.

/// A message to be interpreted and routed. `request_id` only correlates log lines.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub request_id: String,
    pub text: String,
}

impl InboundMessage {
    /// New message with a fresh request id.
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_request_id(uuid::Uuid::new_v4().to_string(), text)
    }

    pub fn with_request_id(request_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            text: text.into(),
        }
    }

    /// Whitespace-only text counts as empty.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
