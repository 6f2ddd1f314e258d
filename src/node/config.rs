//! Edge node configuration

use crate::allocator::AllocatorConfig;
use crate::control::ControlPlaneConfig;
use crate::endpoint::EndpointConfig;

/// Edge node configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Origin server address (`host:port`) streams are pulled from
    pub origin_addr: String,

    /// Capacity of each session's audio and video sink
    pub sink_capacity: usize,

    /// Port allocator settings
    pub allocator: AllocatorConfig,

    /// Endpoint settings
    pub endpoint: EndpointConfig,

    /// Control-plane client settings
    pub control: ControlPlaneConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            origin_addr: "127.0.0.1:8080".to_string(),
            sink_capacity: 128,
            allocator: AllocatorConfig::default(),
            endpoint: EndpointConfig::default(),
            control: ControlPlaneConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Create a config pulling from `origin`
    pub fn with_origin(origin: impl Into<String>) -> Self {
        Self {
            origin_addr: origin.into(),
            ..Default::default()
        }
    }

    /// Set the origin address
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin_addr = origin.into();
        self
    }

    /// Set the per-session sink capacity
    pub fn sink_capacity(mut self, capacity: usize) -> Self {
        self.sink_capacity = capacity.max(1);
        self
    }

    /// Set the allocator configuration
    pub fn allocator(mut self, allocator: AllocatorConfig) -> Self {
        self.allocator = allocator;
        self
    }

    /// Set the endpoint configuration
    pub fn endpoint(mut self, endpoint: EndpointConfig) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Set the control-plane configuration
    pub fn control(mut self, control: ControlPlaneConfig) -> Self {
        self.control = control;
        self
    }
}
