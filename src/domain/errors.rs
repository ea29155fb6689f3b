//! Domain errors for the event source adapters.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while bridging an external producer to the sink.
///
/// Variants follow the failure taxonomy the adapters act on: configuration
/// errors abort startup, transport and protocol errors are logged by the
/// long-running loops, and authentication or payload errors reject a single
/// request or message.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Session start failed: {0}")]
    SessionStart(String),

    #[error("Subscription failed: {0}")]
    Subscription(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Event not acknowledged by sink: {0}")]
    DispatchNotAcknowledged(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),
}

impl AdapterError {
    /// Returns true if the error must stop the adapter process.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::SessionStart(_)
                | Self::Subscription(_)
                | Self::Server(_)
                | Self::ShutdownTimeout(_)
        )
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedPayload(err.to_string())
    }
}
