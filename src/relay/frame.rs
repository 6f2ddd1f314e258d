//! Relay frame types

use bytes::Bytes;

/// Media type of a subscriber set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Audio packets
    Audio,
    /// Video packets
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// One received datagram
///
/// The payload is an immutable copy taken out of the listener's receive
/// buffer. Cloning shares the allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    payload: Bytes,
}

impl Frame {
    /// Wrap an owned payload
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Copy a received datagram out of a reusable buffer
    pub fn copy_from(datagram: &[u8]) -> Self {
        Self {
            payload: Bytes::copy_from_slice(datagram),
        }
    }

    /// Payload bytes
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the datagram was empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Take the payload
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}
