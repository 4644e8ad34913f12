//! HTTP client for the interpretation service (`POST /interpret` on port 1200 by default).

use super::{InterpretError, Interpreter};
use crate::command::RawCommand;
use crate::config::InterpreterConfig;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Reply used when the service is too slow and fallback is enabled.
pub const TIMEOUT_FALLBACK_MESSAGE: &str = "interpretation service timed out";

#[derive(Debug, Serialize)]
struct InterpretRequest<'a> {
    message: &'a str,
}

/// Client for the interpretation service.
#[derive(Clone)]
pub struct HttpInterpreter {
    url: String,
    timeout: Duration,
    fallback_on_timeout: bool,
    client: reqwest::Client,
}

impl HttpInterpreter {
    pub fn new(url: impl Into<String>, timeout: Duration, fallback_on_timeout: bool) -> Self {
        Self {
            url: url.into(),
            timeout,
            fallback_on_timeout,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &InterpreterConfig) -> Self {
        Self::new(
            config.url.trim(),
            config.timeout(),
            config.fallback_on_timeout,
        )
    }

    /// POST `{ "message": text }` and parse `{ type, data, message }`.
    async fn request(&self, text: &str) -> Result<RawCommand, InterpretError> {
        let res = self
            .client
            .post(&self.url)
            .json(&InterpretRequest { message: text })
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(InterpretError::Api(format!("{} {}", status, body)));
        }
        let body = res.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| InterpretError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Interpreter for HttpInterpreter {
    async fn interpret(&self, text: &str) -> Result<RawCommand, InterpretError> {
        match tokio::time::timeout(self.timeout, self.request(text)).await {
            Ok(result) => result,
            Err(_) if self.fallback_on_timeout => {
                log::warn!(
                    "interpreter: no answer within {:?}, falling back to unknown",
                    self.timeout
                );
                Ok(RawCommand::unknown(TIMEOUT_FALLBACK_MESSAGE))
            }
            Err(_) => Err(InterpretError::Timeout(self.timeout)),
        }
    }
}
