//! Relay configuration

/// Fan-out relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Receive buffer per listener; longer datagrams are truncated
    pub recv_buffer_size: usize,

    /// Capacity of the listener → owner frame queue
    pub frame_queue_capacity: usize,

    /// Capacity of the owner's subscription command queue
    pub command_queue_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            recv_buffer_size: 4096,
            frame_queue_capacity: 256,
            command_queue_capacity: 32,
        }
    }
}

impl RelayConfig {
    /// Set the listener receive buffer size
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size.max(1);
        self
    }

    /// Set the frame queue capacity
    pub fn frame_queue_capacity(mut self, capacity: usize) -> Self {
        self.frame_queue_capacity = capacity.max(1);
        self
    }

    /// Set the command queue capacity
    pub fn command_queue_capacity(mut self, capacity: usize) -> Self {
        self.command_queue_capacity = capacity.max(1);
        self
    }
}
