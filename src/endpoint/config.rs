//! Endpoint configuration

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use crate::relay::RelayConfig;

/// Default audio payload type announced to the origin
pub const DEFAULT_AUDIO_PAYLOAD_TYPE: u8 = 96;

/// Default video payload type announced to the origin
pub const DEFAULT_VIDEO_PAYLOAD_TYPE: u8 = 97;

/// Relay endpoint configuration
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Address announced to the origin; discovered when `None`
    pub advertised_host: Option<IpAddr>,

    /// Audio RTP payload type
    pub audio_payload_type: u8,

    /// Video RTP payload type
    pub video_payload_type: u8,

    /// Ask the origin for simulcast layers
    pub simulcast: bool,

    /// Capacity of the lifecycle command queue
    pub command_queue_capacity: usize,

    /// Fan-out relay settings
    pub relay: RelayConfig,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            advertised_host: None,
            audio_payload_type: DEFAULT_AUDIO_PAYLOAD_TYPE,
            video_payload_type: DEFAULT_VIDEO_PAYLOAD_TYPE,
            simulcast: false,
            command_queue_capacity: 16,
            relay: RelayConfig::default(),
        }
    }
}

impl EndpointConfig {
    /// Set the address announced to the origin
    pub fn advertised_host(mut self, host: IpAddr) -> Self {
        self.advertised_host = Some(host);
        self
    }

    /// Set the payload types
    pub fn payload_types(mut self, audio: u8, video: u8) -> Self {
        self.audio_payload_type = audio;
        self.video_payload_type = video;
        self
    }

    /// Enable simulcast
    pub fn simulcast(mut self, enabled: bool) -> Self {
        self.simulcast = enabled;
        self
    }

    /// Set the relay configuration
    pub fn relay(mut self, relay: RelayConfig) -> Self {
        self.relay = relay;
        self
    }

    /// Address to announce, discovering one if not configured
    pub fn resolve_host(&self) -> IpAddr {
        self.advertised_host
            .or_else(local_ipv4)
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }
}

/// First non-loopback IPv4 address of this host
///
/// Connecting a UDP socket only selects a route; no packet is sent.
pub fn local_ipv4() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9)).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_loopback() && !ip.is_unspecified()).then_some(ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EndpointConfig::default();

        assert!(config.advertised_host.is_none());
        assert_eq!(config.audio_payload_type, 96);
        assert_eq!(config.video_payload_type, 97);
        assert!(!config.simulcast);
    }

    #[test]
    fn test_configured_host_wins() {
        let host = IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3));
        let config = EndpointConfig::default().advertised_host(host);

        assert_eq!(config.resolve_host(), host);
    }

    #[test]
    fn test_discovered_host_is_not_loopback() {
        let host = EndpointConfig::default().resolve_host();
        assert!(!host.is_loopback());
    }

    #[test]
    fn test_builder_chaining() {
        let config = EndpointConfig::default()
            .payload_types(111, 100)
            .simulcast(true)
            .relay(RelayConfig::default().recv_buffer_size(1500));

        assert_eq!(config.audio_payload_type, 111);
        assert_eq!(config.video_payload_type, 100);
        assert!(config.simulcast);
        assert_eq!(config.relay.recv_buffer_size, 1500);
    }
}
