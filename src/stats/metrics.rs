//! Statistics for relay owners, listeners and endpoints

use std::sync::atomic::{AtomicU64, Ordering};

use crate::relay::MediaKind;

/// Snapshot of one fan-out owner
///
/// The owner keeps these as plain counters since nothing else touches
/// them; callers get a copy through a stats command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutStats {
    /// Media type served by the owner
    pub kind: MediaKind,
    /// Currently attached sessions
    pub subscribers: usize,
    /// Frames taken off the frame queue
    pub frames_received: u64,
    /// Successful sends to subscriber sinks
    pub deliveries: u64,
    /// Sends skipped because a sink was full
    pub dropped_full: u64,
    /// Subscribers removed because their sink was closed
    pub pruned_closed: u64,
}

impl FanOutStats {
    /// Create zeroed stats for a media type
    pub fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            subscribers: 0,
            frames_received: 0,
            deliveries: 0,
            dropped_full: 0,
            pruned_closed: 0,
        }
    }

    /// Fraction of attempted sends that were dropped, in `[0, 1]`
    pub fn drop_ratio(&self) -> f64 {
        let attempts = self.deliveries + self.dropped_full;
        if attempts > 0 {
            self.dropped_full as f64 / attempts as f64
        } else {
            0.0
        }
    }
}

/// Live counters shared between a listener task and its owner handle
#[derive(Debug, Default)]
pub struct ListenerCounters {
    datagrams: AtomicU64,
    bytes: AtomicU64,
    queue_overflows: AtomicU64,
}

impl ListenerCounters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_datagram(&self, len: usize) {
        self.datagrams.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_overflow(&self) {
        self.queue_overflows.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot
    pub fn snapshot(&self) -> ListenerStats {
        ListenerStats {
            datagrams: self.datagrams.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            queue_overflows: self.queue_overflows.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of one socket listener
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    /// Datagrams received
    pub datagrams: u64,
    /// Payload bytes received
    pub bytes: u64,
    /// Datagrams dropped because the owner's frame queue was full
    pub queue_overflows: u64,
}

/// Statistics for one relay endpoint
#[derive(Debug, Clone)]
pub struct EndpointStats {
    /// Stream served by the endpoint
    pub stream_id: String,
    /// Base port of the endpoint's lease
    pub base_port: u16,
    /// Audio owner
    pub audio: FanOutStats,
    /// Video owner
    pub video: FanOutStats,
    /// Audio socket listener
    pub audio_listener: ListenerStats,
    /// Primary video socket listener
    pub video_listener: ListenerStats,
    /// Secondary video socket listener
    pub video2_listener: ListenerStats,
}

impl EndpointStats {
    /// Total bytes received over all three sockets
    pub fn bytes_received(&self) -> u64 {
        self.audio_listener.bytes + self.video_listener.bytes + self.video2_listener.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fanout_stats_new() {
        let stats = FanOutStats::new(MediaKind::Audio);
        assert_eq!(stats.kind, MediaKind::Audio);
        assert_eq!(stats.subscribers, 0);
        assert_eq!(stats.frames_received, 0);
        assert_eq!(stats.deliveries, 0);
        assert_eq!(stats.dropped_full, 0);
        assert_eq!(stats.pruned_closed, 0);
    }

    #[test]
    fn test_drop_ratio() {
        let mut stats = FanOutStats::new(MediaKind::Video);
        assert_eq!(stats.drop_ratio(), 0.0);

        stats.deliveries = 3;
        stats.dropped_full = 1;
        assert!((stats.drop_ratio() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_listener_counters() {
        let counters = ListenerCounters::new();
        counters.record_datagram(100);
        counters.record_datagram(50);
        counters.record_overflow();

        let stats = counters.snapshot();
        assert_eq!(stats.datagrams, 2);
        assert_eq!(stats.bytes, 150);
        assert_eq!(stats.queue_overflows, 1);
    }

    #[test]
    fn test_endpoint_bytes_received() {
        let stats = EndpointStats {
            stream_id: "s1".to_string(),
            base_port: 45000,
            audio: FanOutStats::new(MediaKind::Audio),
            video: FanOutStats::new(MediaKind::Video),
            audio_listener: ListenerStats {
                datagrams: 1,
                bytes: 10,
                queue_overflows: 0,
            },
            video_listener: ListenerStats::default(),
            video2_listener: ListenerStats {
                datagrams: 2,
                bytes: 32,
                queue_overflows: 0,
            },
        };

        assert_eq!(stats.bytes_received(), 42);
    }
}
