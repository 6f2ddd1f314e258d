//! Allocator error types

/// Error type for port allocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// Every block in the configured range is leased or unbindable
    ExhaustedRange,
    /// Configured range cannot hold a single block
    InvalidRange { min: u16, max: u16 },
    /// Allocator task is no longer running
    Stopped,
}

impl std::fmt::Display for AllocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocationError::ExhaustedRange => write!(f, "All port blocks in range are in use"),
            AllocationError::InvalidRange { min, max } => {
                write!(f, "Invalid port range: {}..{}", min, max)
            }
            AllocationError::Stopped => write!(f, "Port allocator stopped"),
        }
    }
}

impl std::error::Error for AllocationError {}
