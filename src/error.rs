//! Crate-level error type
//!
//! Each subsystem has its own error enum; this module ties them together so
//! endpoint and node operations can return a single `Result`.

use crate::allocator::AllocationError;
use crate::control::ControlPlaneError;
use crate::relay::RelayError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Port lease could not be acquired
    Allocation(AllocationError),
    /// Subscription command rejected by a fan-out owner
    Relay(RelayError),
    /// Origin rejected or could not be reached
    ControlPlane(ControlPlaneError),
    /// Endpoint handle used after close
    EndpointClosed,
    /// Socket level failure
    Io(std::io::Error),
}

impl Error {
    /// Whether this error reports a duplicate attach
    pub fn is_already_attached(&self) -> bool {
        matches!(self, Error::Relay(RelayError::AlreadyAttached(_)))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Allocation(e) => write!(f, "Port allocation failed: {}", e),
            Error::Relay(e) => write!(f, "Relay error: {}", e),
            Error::ControlPlane(e) => write!(f, "Control plane error: {}", e),
            Error::EndpointClosed => write!(f, "Endpoint is closed"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Allocation(e) => Some(e),
            Error::Relay(e) => Some(e),
            Error::ControlPlane(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::EndpointClosed => None,
        }
    }
}

impl From<AllocationError> for Error {
    fn from(e: AllocationError) -> Self {
        Error::Allocation(e)
    }
}

impl From<RelayError> for Error {
    fn from(e: RelayError) -> Self {
        Error::Relay(e)
    }
}

impl From<ControlPlaneError> for Error {
    fn from(e: ControlPlaneError) -> Self {
        Error::ControlPlane(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
