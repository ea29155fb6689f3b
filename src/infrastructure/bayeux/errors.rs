use thiserror::Error;

use crate::domain::errors::AdapterError;

/// Errors that can occur when talking to a Bayeux server
#[derive(Error, Debug)]
pub enum BayeuxError {
    /// The handshake returned an empty message list
    #[error("Empty handshake response")]
    EmptyHandshakeResponse,

    /// The handshake was answered but no session was granted
    #[error("Handshake rejected: {0}")]
    HandshakeRejected(String),

    /// Non-2xx HTTP status, with the response body for diagnostics
    #[error("Protocol error on {channel} (HTTP {status}): {body}")]
    Protocol {
        channel: &'static str,
        status: u16,
        body: String,
    },

    /// Network or connection error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body was not a list of Bayeux messages
    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Subscription to {topic} failed: {error}")]
    SubscriptionFailed { topic: String, error: String },

    #[error("Empty subscribe response for {0}")]
    EmptySubscribeResponse(String),

    /// A meta message reported failure without advising a handshake
    #[error("Unsuccessful {channel} response: {error}")]
    MetaUnsuccessful { channel: String, error: String },

    /// Sign-in at the authorization server failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("No active session; handshake first")]
    NoSession,

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl BayeuxError {
    /// Returns true if the next Connect may succeed without intervention
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Decode(_) | Self::Protocol { .. } | Self::MetaUnsuccessful { .. }
        )
    }

    /// Returns true if the server refused the bearer token
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Protocol { status: 401 | 403, .. })
    }
}

impl From<BayeuxError> for AdapterError {
    fn from(err: BayeuxError) -> Self {
        match err {
            BayeuxError::EmptyHandshakeResponse | BayeuxError::HandshakeRejected(_) => {
                Self::SessionStart(err.to_string())
            }
            BayeuxError::SubscriptionFailed { .. } | BayeuxError::EmptySubscribeResponse(_) => {
                Self::Subscription(err.to_string())
            }
            BayeuxError::Protocol {
                status: 401 | 403, ..
            }
            | BayeuxError::Authentication(_) => Self::Authentication(err.to_string()),
            BayeuxError::Network(_) => Self::Transport(err.to_string()),
            BayeuxError::InvalidEndpoint(_) => Self::Configuration(err.to_string()),
            BayeuxError::Protocol { .. }
            | BayeuxError::Decode(_)
            | BayeuxError::MetaUnsuccessful { .. }
            | BayeuxError::NoSession => Self::Protocol(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(BayeuxError::Protocol {
            channel: "/meta/connect",
            status: 503,
            body: "unavailable".to_string()
        }
        .is_transient());
        assert!(BayeuxError::MetaUnsuccessful {
            channel: "/meta/connect".to_string(),
            error: "500::".to_string()
        }
        .is_transient());
        assert!(!BayeuxError::NoSession.is_transient());
        assert!(!BayeuxError::EmptyHandshakeResponse.is_transient());
        assert!(!BayeuxError::Authentication("invalid_grant".to_string()).is_transient());
    }

    #[test]
    fn test_conversion_to_adapter_error() {
        assert!(matches!(
            AdapterError::from(BayeuxError::EmptyHandshakeResponse),
            AdapterError::SessionStart(_)
        ));
        assert!(matches!(
            AdapterError::from(BayeuxError::SubscriptionFailed {
                topic: "/topic/A".to_string(),
                error: "403::Forbidden".to_string()
            }),
            AdapterError::Subscription(_)
        ));
        assert!(matches!(
            AdapterError::from(BayeuxError::NoSession),
            AdapterError::Protocol(_)
        ));
        assert!(matches!(
            AdapterError::from(BayeuxError::Protocol {
                channel: "/meta/handshake",
                status: 401,
                body: "INVALID_SESSION_ID".to_string()
            }),
            AdapterError::Authentication(_)
        ));
        assert!(matches!(
            AdapterError::from(BayeuxError::Authentication("invalid_grant".to_string())),
            AdapterError::Authentication(_)
        ));
    }
}
