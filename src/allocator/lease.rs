//! Port lease
//!
//! A lease is the proof that its holder owns one block of three bound UDP
//! sockets. Only the allocator creates leases. The allocator keeps no
//! socket handles of its own: the block is returned to the pool when the
//! last handle to any of its three sockets is dropped, which is also the
//! moment the ports are closed.

use std::ops::Deref;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use super::{AUDIO_OFFSET, VIDEO2_OFFSET, VIDEO_OFFSET};

/// Reports a block back to the allocator once all its sockets are gone
#[derive(Debug)]
pub(super) struct ReturnTicket {
    base_port: u16,
    returns: mpsc::UnboundedSender<u16>,
}

impl ReturnTicket {
    pub(super) fn new(base_port: u16, returns: mpsc::UnboundedSender<u16>) -> Self {
        Self { base_port, returns }
    }
}

impl Drop for ReturnTicket {
    fn drop(&mut self) {
        // Fails only when the allocator has already stopped.
        let _ = self.returns.send(self.base_port);
    }
}

/// A socket belonging to a leased block
///
/// Dereferences to the underlying [`UdpSocket`].
#[derive(Debug)]
pub struct LeaseSocket {
    // Declared first so the port is closed before the ticket is returned.
    socket: UdpSocket,
    _ticket: Arc<ReturnTicket>,
}

impl Deref for LeaseSocket {
    type Target = UdpSocket;

    fn deref(&self) -> &UdpSocket {
        &self.socket
    }
}

/// One block of bound relay sockets
#[derive(Debug)]
pub struct PortLease {
    base_port: u16,
    audio: Arc<LeaseSocket>,
    video: Arc<LeaseSocket>,
    video2: Arc<LeaseSocket>,
}

impl PortLease {
    pub(super) fn new(
        base_port: u16,
        [audio, video, video2]: [UdpSocket; 3],
        ticket: ReturnTicket,
    ) -> Self {
        let ticket = Arc::new(ticket);
        let wrap = |socket| {
            Arc::new(LeaseSocket {
                socket,
                _ticket: Arc::clone(&ticket),
            })
        };

        Self {
            base_port,
            audio: wrap(audio),
            video: wrap(video),
            video2: wrap(video2),
        }
    }

    /// Base port of the block
    pub fn base_port(&self) -> u16 {
        self.base_port
    }

    /// Audio port (`base + 0`)
    pub fn audio_port(&self) -> u16 {
        self.base_port + AUDIO_OFFSET
    }

    /// Primary video port (`base + 2`)
    pub fn video_port(&self) -> u16 {
        self.base_port + VIDEO_OFFSET
    }

    /// Secondary video port (`base + 4`)
    pub fn video2_port(&self) -> u16 {
        self.base_port + VIDEO2_OFFSET
    }

    /// All three ports in audio, video, video2 order
    pub fn ports(&self) -> [u16; 3] {
        [self.audio_port(), self.video_port(), self.video2_port()]
    }

    /// Audio socket
    pub fn audio_socket(&self) -> &Arc<LeaseSocket> {
        &self.audio
    }

    /// Primary video socket
    pub fn video_socket(&self) -> &Arc<LeaseSocket> {
        &self.video
    }

    /// Secondary video socket
    pub fn video2_socket(&self) -> &Arc<LeaseSocket> {
        &self.video2
    }
}
