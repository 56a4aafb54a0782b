use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LinkError, Result};

/// Correlated reply to a request sent with `requestId`
///
/// `body` is the full message as received. Business-level failures
/// (`ok: false`, `success: false`, `error: ...`) are still replies; use
/// [`Reply::into_result`] to turn them into errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub request_id: u64,
    pub body: Value,
}

impl Reply {
    pub fn new(request_id: u64, body: Value) -> Self {
        Self { request_id, body }
    }

    /// True when the server reported success and no error
    pub fn is_success(&self) -> bool {
        if self.error().is_some() {
            return false;
        }

        self.body
            .get("ok")
            .or_else(|| self.body.get("success"))
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    /// Error text from the `error` field
    pub fn error(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }

    /// Human-readable message from `msg` or `message`
    pub fn message(&self) -> Option<&str> {
        self.body
            .get("msg")
            .or_else(|| self.body.get("message"))
            .and_then(Value::as_str)
    }

    /// Convert a failed reply into `LinkError::ServerError`
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }

        let reason = self
            .error()
            .or_else(|| self.message())
            .unwrap_or("request rejected")
            .to_string();
        Err(LinkError::ServerError(reason))
    }
}

/// Batch of buffered messages returned by a poll
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollBatch {
    #[serde(default)]
    pub messages: Vec<Value>,
}
