//! Interpretation service client.
//!
//! The service turns free text into a [`RawCommand`]. [`Interpreter`] is the seam the
//! dispatcher depends on; [`HttpInterpreter`] talks to the real service over HTTP.

mod http;

use crate::command::RawCommand;
use async_trait::async_trait;

pub use http::{HttpInterpreter, TIMEOUT_FALLBACK_MESSAGE};

#[derive(Debug, thiserror::Error)]
pub enum InterpretError {
    #[error("interpretation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("interpretation service error: {0}")]
    Api(String),
    #[error("interpretation response malformed: {0}")]
    Decode(String),
    #[error("interpretation service did not answer within {0:?}")]
    Timeout(std::time::Duration),
}

/// Turns natural-language text into a raw command.
#[async_trait]
pub trait Interpreter: Send + Sync {
    async fn interpret(&self, text: &str) -> Result<RawCommand, InterpretError>;
}
