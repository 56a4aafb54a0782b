use std::time::Duration;
use thiserror::Error;

use crate::validation::ValidationError;

/// Error types for the session client
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Invalid server address: {0}")]
    InvalidUrl(String),

    #[error("Connection already in progress")]
    AlreadyConnecting,

    #[error("Connection timed out after {0:?}")]
    ConnectionTimeout(Duration),

    #[error("WebSocket error: {0}")]
    SocketError(String),

    #[error("Unable to reconnect after {0} attempts, please log in again")]
    MaxReconnectExceeded(u32),

    #[error("Failed to send message: {0}")]
    SendFailed(String),

    #[error("No reply to request {request_id} within {timeout:?}")]
    RequestTimeout { request_id: u64, timeout: Duration },

    #[error("No pong received within {0:?}")]
    PingTimeout(Duration),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid message format: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Type alias for Results using LinkError
pub type Result<T> = std::result::Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LinkError::MaxReconnectExceeded(5);
        assert_eq!(
            err.to_string(),
            "Unable to reconnect after 5 attempts, please log in again"
        );

        let err = LinkError::RequestTimeout {
            request_id: 7,
            timeout: Duration::from_secs(2),
        };
        assert_eq!(err.to_string(), "No reply to request 7 within 2s");

        let err = LinkError::ConnectionClosed;
        assert_eq!(err.to_string(), "Connection closed");
    }

    #[test]
    fn test_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json");
        assert!(json_err.is_err());

        let link_err: LinkError = json_err.unwrap_err().into();
        assert!(matches!(link_err, LinkError::ParseError(_)));

        let link_err: LinkError = ValidationError::EmptyMessage.into();
        assert!(matches!(link_err, LinkError::Validation(_)));
        assert_eq!(link_err.to_string(), "Message is empty");
    }
}
