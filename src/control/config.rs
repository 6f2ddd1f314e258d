//! Control-plane client configuration

use std::time::Duration;

/// HTTP control-plane client configuration
#[derive(Debug, Clone)]
pub struct ControlPlaneConfig {
    /// Timeout for a whole request, connect to body
    pub timeout: Duration,

    /// URL scheme used to reach the origin
    pub scheme: &'static str,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            scheme: "http",
        }
    }
}

impl ControlPlaneConfig {
    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
