//! Control-plane error types

/// Error type for control-plane requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlPlaneError {
    /// Origin answered with a non-success status
    Rejected { status: u16, body: String },
    /// Request could not be delivered or timed out
    Transport(String),
    /// Media description could not be encoded
    Encode(String),
}

impl std::fmt::Display for ControlPlaneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlPlaneError::Rejected { status, body } => {
                write!(f, "Origin rejected request ({}): {}", status, body)
            }
            ControlPlaneError::Transport(msg) => write!(f, "Request failed: {}", msg),
            ControlPlaneError::Encode(msg) => write!(f, "Failed to encode request: {}", msg),
        }
    }
}

impl std::error::Error for ControlPlaneError {}
