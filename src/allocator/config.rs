//! Allocator configuration

use std::net::{IpAddr, Ipv4Addr};

use super::error::AllocationError;
use super::BLOCK_SIZE;

/// Port allocator configuration
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// First port of the range (inclusive)
    pub port_min: u16,

    /// End of the range (exclusive)
    pub port_max: u16,

    /// Address the relay sockets bind to
    pub bind_ip: IpAddr,

    /// Capacity of the allocator request queue
    pub queue_capacity: usize,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            port_min: 45000,
            port_max: 50000,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            queue_capacity: 64,
        }
    }
}

impl AllocatorConfig {
    /// Set the port range `[min, max)`
    pub fn port_range(mut self, min: u16, max: u16) -> Self {
        self.port_min = min;
        self.port_max = max;
        self
    }

    /// Set the bind address
    pub fn bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Set the request queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Number of whole blocks that fit in the range
    pub fn block_count(&self) -> usize {
        usize::from(self.port_max.saturating_sub(self.port_min) / BLOCK_SIZE)
    }

    /// Check that the range can hold at least one block
    pub fn validate(&self) -> Result<(), AllocationError> {
        if self.port_min == 0 || self.block_count() == 0 {
            return Err(AllocationError::InvalidRange {
                min: self.port_min,
                max: self.port_max,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AllocatorConfig::default();

        assert_eq!(config.port_min, 45000);
        assert_eq!(config.port_max, 50000);
        assert!(config.bind_ip.is_unspecified());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_block_count() {
        let config = AllocatorConfig::default().port_range(45000, 45012);
        assert_eq!(config.block_count(), 2);

        let config = AllocatorConfig::default().port_range(45000, 45017);
        assert_eq!(config.block_count(), 2);
    }

    #[test]
    fn test_invalid_ranges() {
        let too_small = AllocatorConfig::default().port_range(45000, 45005);
        assert_eq!(
            too_small.validate(),
            Err(AllocationError::InvalidRange {
                min: 45000,
                max: 45005
            })
        );

        let inverted = AllocatorConfig::default().port_range(50000, 45000);
        assert!(inverted.validate().is_err());

        let zero = AllocatorConfig::default().port_range(0, 100);
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_queue_capacity_floor() {
        let config = AllocatorConfig::default().queue_capacity(0);
        assert_eq!(config.queue_capacity, 1);
    }
}
