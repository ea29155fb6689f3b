//! Outcome of a single delivery attempt to the sink.

use thiserror::Error;

/// Reasons a delivery attempt was not acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Sink unreachable: {0}")]
    Transport(String),

    #[error("Sink rejected event with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Event could not be encoded: {0}")]
    Encoding(String),
}

/// Ephemeral result produced per envelope; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    pub acknowledged: bool,
    pub error: Option<DispatchError>,
}

impl DispatchResult {
    pub const fn acknowledged() -> Self {
        Self {
            acknowledged: true,
            error: None,
        }
    }

    pub const fn failed(error: DispatchError) -> Self {
        Self {
            acknowledged: false,
            error: Some(error),
        }
    }

    /// Convert into a `Result`, keeping the error for not-acknowledged sends.
    pub fn into_result(self) -> Result<(), DispatchError> {
        match (self.acknowledged, self.error) {
            (true, _) => Ok(()),
            (false, Some(error)) => Err(error),
            (false, None) => Err(DispatchError::Transport(
                "sink did not acknowledge the event".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acknowledged_result() {
        assert!(DispatchResult::acknowledged().into_result().is_ok());
    }

    #[test]
    fn test_failed_result_keeps_error() {
        let result = DispatchResult::failed(DispatchError::Rejected {
            status: 503,
            body: "unavailable".to_string(),
        });
        assert!(!result.acknowledged);
        assert_eq!(
            result.into_result(),
            Err(DispatchError::Rejected {
                status: 503,
                body: "unavailable".to_string()
            })
        );
    }
}
