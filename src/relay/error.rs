//! Relay error types

/// Error type for subscription commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Session already has a sink for this media type
    AlreadyAttached(String),
    /// Owner task has shut down
    Stopped,
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::AlreadyAttached(id) => write!(f, "Session already attached: {}", id),
            RelayError::Stopped => write!(f, "Relay owner stopped"),
        }
    }
}

impl std::error::Error for RelayError {}
