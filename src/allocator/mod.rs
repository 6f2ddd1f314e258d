//! UDP port-triplet allocator
//!
//! Every relay endpoint needs three UDP listening ports: one for audio and
//! two for the video layers. The allocator hands out disjoint blocks of
//! those ports and takes them back on release, so many streams can share
//! one host without colliding.
//!
//! # Architecture
//!
//! ```text
//!     PortAllocator (Clone)          allocator task (sole owner)
//!   ┌────────────────────┐       ┌──────────────────────────────┐
//!   │ acquire()  ────────┼──────►│ leases: HashSet<base>        │
//!   │ leased()   ────────┼──────►│ cursor: u16                  │
//!   │ shutdown() ────────┼──────►│                              │
//!   └────────────────────┘ mpsc  └──────────────┬───────────────┘
//!              ▲                        ▲       │
//!              └── oneshot reply ───────┼───────┘
//!                                       │
//!   PortLease dropped ── base port ─────┘ (unbounded, handled first)
//! ```
//!
//! Requests are processed one at a time by the allocator task. Returned
//! blocks are drained before the next request, so an acquire always
//! observes every lease dropped before it was sent. Nothing outside the
//! task touches the lease table.
//!
//! Blocks are laid out every 6 ports starting at `port_min`; within a
//! block audio uses offset 0, video offset 2 and secondary video offset 4.

pub mod config;
pub mod error;
pub mod lease;
pub mod store;

pub use config::AllocatorConfig;
pub use error::AllocationError;
pub use lease::{LeaseSocket, PortLease};
pub use store::PortAllocator;

/// Number of ports reserved per lease block
pub const BLOCK_SIZE: u16 = 6;

/// Offset of the audio port from the block base
pub const AUDIO_OFFSET: u16 = 0;

/// Offset of the primary video port from the block base
pub const VIDEO_OFFSET: u16 = 2;

/// Offset of the secondary (simulcast) video port from the block base
pub const VIDEO2_OFFSET: u16 = 4;
