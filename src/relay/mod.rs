//! Fan-out relay
//!
//! One [`StreamRelay`] runs per upstream stream. It receives RTP datagrams
//! on the three sockets of a port lease and republishes them to every
//! viewer session attached to that media type.
//!
//! # Architecture
//!
//! ```text
//!   audio socket ──► Listener ──Frame──► FanOut(audio) ──Bytes──► sink A
//!                                            ▲  │                ► sink B
//!                             Attach/Detach  │  └──────────────► ...
//!                                            │
//!   video2 socket ─► Listener ──Frame──► FanOut(video) ──Bytes──► sinks
//!
//!   video socket ──► Listener (drain only)
//! ```
//!
//! Each [`FanOut`] is the only task that ever reads or writes its
//! subscriber map. Inbound frames and subscription commands arrive on two
//! bounded queues and are handled one event at a time, so a subscriber is
//! never added or removed in the middle of a fan-out pass.
//!
//! # Delivery policy
//!
//! Sends to subscriber sinks never wait. A full sink loses that frame and
//! only that subscriber is affected; stale real-time media is worse than a
//! gap. A datagram is copied once out of the receive buffer into `Bytes`
//! and every subscriber shares that allocation.

pub mod config;
pub mod error;
pub mod fanout;
pub mod frame;
pub mod listener;
pub mod stream;

pub use config::RelayConfig;
pub use error::RelayError;
pub use fanout::{FanOut, Sink};
pub use frame::{Frame, MediaKind};
pub use listener::{DatagramSource, Listener, ListenerMode};
pub use stream::{RelaySummary, StreamRelay};
