//! Error types for the application

use thiserror::Error;

/// Result type alias using our ClientError
pub type Result<T> = std::result::Result<T, ClientError>;

/// Main error type for exchange operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// Missing or unusable credentials. Raised while building clients at startup.
    #[error("Signing error: {0}")]
    Signing(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network-level failure. Retryable by the caller, never retried internally.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The exchange answered but refused the request; `body` is its raw payload
    #[error("Exchange rejected request (status {status}): {body}")]
    ExchangeRejection {
        status: u16,
        body: serde_json::Value,
    },

    /// Request failed local validation before reaching the exchange
    #[error("Validation error: {0}")]
    Validation(String),

    /// Upstream or downstream socket went away
    #[error("Stream terminated: {0}")]
    StreamTerminated(String),

    /// WebSocket connection errors
    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    /// WebSocket send/receive errors
    #[error("WebSocket communication error: {0}")]
    WebSocketCommunication(String),

    /// Login handshake was not acknowledged
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Invalid API response
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Channel send errors
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// No strategy registered under this id
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Timeout(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::WebSocketCommunication(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ClientError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        ClientError::Timeout(err.to_string())
    }
}
