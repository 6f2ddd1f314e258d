//! Media description sent with a provisioning request

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::allocator::PortLease;
use crate::endpoint::EndpointConfig;

/// Where and how the origin should send a stream
///
/// Serialized with the origin's field names, e.g.
/// `{"host":"10.0.0.5","simulcast":false,"audioPtype":96,...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDescription {
    /// Address the origin should send to
    pub host: String,
    /// Whether the origin sends simulcast layers
    pub simulcast: bool,
    /// Audio RTP payload type
    pub audio_ptype: u8,
    /// Video RTP payload type
    pub video_ptype: u8,
    /// Audio port
    pub audio_port: u16,
    /// Primary video port
    pub video_port: u16,
    /// Secondary video port
    pub video_port2: u16,
    /// Audio synchronization source
    pub audio_ssrc: u32,
    /// Primary video synchronization source
    pub video_ssrc: u32,
    /// Secondary video synchronization source
    pub video_ssrc2: u32,
}

impl MediaDescription {
    /// Describe a lease, generating fresh synchronization sources
    pub fn for_lease(host: IpAddr, lease: &PortLease, config: &EndpointConfig) -> Self {
        Self {
            host: host.to_string(),
            simulcast: config.simulcast,
            audio_ptype: config.audio_payload_type,
            video_ptype: config.video_payload_type,
            audio_port: lease.audio_port(),
            video_port: lease.video_port(),
            video_port2: lease.video2_port(),
            audio_ssrc: rand::random(),
            video_ssrc: rand::random(),
            video_ssrc2: rand::random(),
        }
    }

    /// Encode as the JSON request body
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
