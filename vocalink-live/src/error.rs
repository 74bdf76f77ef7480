//! Error types for live sessions.

use thiserror::Error;

/// Result type for live session operations.
pub type Result<T> = std::result::Result<T, LiveError>;

/// Errors that can occur while driving a live session.
#[derive(Error, Debug)]
pub enum LiveError {
    /// Handshake or transport failure.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Malformed inbound message or undecodable audio payload.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Operation needs an open connection.
    #[error("Session not connected")]
    NotConnected,

    /// A pending connect was cancelled by a disconnect.
    #[error("Connect cancelled by disconnect")]
    Cancelled,

    /// Timeout waiting for the handshake.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Audio format error.
    #[error("Audio format error: {0}")]
    AudioFormatError(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl LiveError {
    /// Create a new connection error.
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a new protocol error.
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Self::ProtocolError(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a new audio format error.
    pub fn audio<S: Into<String>>(msg: S) -> Self {
        Self::AudioFormatError(msg.into())
    }

    /// Whether this error came from the transport rather than the payload.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::ConnectionError(_) | Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_keep_context() {
        assert_eq!(
            LiveError::connection("handshake rejected").to_string(),
            "Connection error: handshake rejected"
        );
        assert_eq!(LiveError::protocol("bad json").to_string(), "Protocol error: bad json");
        assert_eq!(LiveError::config("empty key").to_string(), "Invalid configuration: empty key");
        assert_eq!(LiveError::audio("odd length").to_string(), "Audio format error: odd length");
    }

    #[test]
    fn test_is_transport() {
        assert!(LiveError::connection("x").is_transport());
        assert!(LiveError::Timeout("x".into()).is_transport());
        assert!(!LiveError::protocol("x").is_transport());
        assert!(!LiveError::NotConnected.is_transport());
    }

    #[test]
    fn test_serde_error_converts() {
        let err: LiveError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, LiveError::SerializationError(_)));
    }
}
