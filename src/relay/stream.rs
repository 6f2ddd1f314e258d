//! Per-stream relay
//!
//! Wires the three sockets of a [`PortLease`] to their listeners and the
//! two fan-out owners.

use std::sync::Arc;

use crate::allocator::PortLease;
use crate::stats::{FanOutStats, ListenerStats};

use super::config::RelayConfig;
use super::error::RelayError;
use super::fanout::FanOut;
use super::frame::MediaKind;
use super::listener::{DatagramSource, Listener, ListenerMode};

/// Listeners and owners relaying one upstream stream
pub struct StreamRelay {
    audio: FanOut,
    video: FanOut,
    audio_listener: Listener,
    video_listener: Listener,
    video2_listener: Listener,
}

/// Final counters of a stopped relay
#[derive(Debug, Clone)]
pub struct RelaySummary {
    /// Audio owner
    pub audio: FanOutStats,
    /// Video owner
    pub video: FanOutStats,
    /// Listener counters in audio, video, video2 order
    pub listeners: [ListenerStats; 3],
    /// Listeners that had stopped on a socket error
    pub failed_listeners: Vec<&'static str>,
}

impl StreamRelay {
    /// Start listeners and owners for a lease
    ///
    /// The secondary video socket feeds the video owner. The primary video
    /// socket is drained and counted but not forwarded.
    pub fn start(lease: &PortLease, config: &RelayConfig) -> Self {
        Self::with_sources(
            Arc::clone(lease.audio_socket()),
            Arc::clone(lease.video_socket()),
            Arc::clone(lease.video2_socket()),
            config,
        )
    }

    /// Start listeners and owners on arbitrary datagram sources
    pub fn with_sources<A, V, W>(
        audio_source: Arc<A>,
        video_source: Arc<V>,
        video2_source: Arc<W>,
        config: &RelayConfig,
    ) -> Self
    where
        A: DatagramSource,
        V: DatagramSource,
        W: DatagramSource,
    {
        let (audio, audio_frames) = FanOut::spawn(MediaKind::Audio, config);
        let (video, video_frames) = FanOut::spawn(MediaKind::Video, config);

        let audio_listener = Listener::spawn(
            "audio",
            audio_source,
            ListenerMode::Forward(audio_frames),
            config.recv_buffer_size,
        );
        let video_listener = Listener::spawn(
            "video",
            video_source,
            ListenerMode::Drain,
            config.recv_buffer_size,
        );
        let video2_listener = Listener::spawn(
            "video2",
            video2_source,
            ListenerMode::Forward(video_frames),
            config.recv_buffer_size,
        );

        Self {
            audio,
            video,
            audio_listener,
            video_listener,
            video2_listener,
        }
    }

    /// Owner for a media type
    pub fn fanout(&self, kind: MediaKind) -> &FanOut {
        match kind {
            MediaKind::Audio => &self.audio,
            MediaKind::Video => &self.video,
        }
    }

    /// Whether a session is attached to either media type
    pub async fn is_attached(&self, session_id: &str) -> Result<bool, RelayError> {
        Ok(self.audio.contains(session_id).await? || self.video.contains(session_id).await?)
    }

    /// Owner statistics in audio, video order
    pub async fn fanout_stats(&self) -> Result<(FanOutStats, FanOutStats), RelayError> {
        Ok((self.audio.stats().await?, self.video.stats().await?))
    }

    /// Listener counters in audio, video, video2 order
    pub fn listener_stats(&self) -> [ListenerStats; 3] {
        [
            self.audio_listener.stats(),
            self.video_listener.stats(),
            self.video2_listener.stats(),
        ]
    }

    /// Stop listeners first, then owners
    ///
    /// Once this returns no relay task holds a socket handle any more.
    pub async fn stop(self) -> RelaySummary {
        let listeners = self.listener_stats();
        let mut failed_listeners = Vec::new();

        for listener in [self.audio_listener, self.video_listener, self.video2_listener] {
            let name = listener.name();
            if let Err(e) = listener.stop().await {
                tracing::debug!(listener = name, error = %e, "Listener had already failed");
                failed_listeners.push(name);
            }
        }

        RelaySummary {
            audio: self.audio.shutdown().await,
            video: self.video.shutdown().await,
            listeners,
            failed_listeners,
        }
    }
}
