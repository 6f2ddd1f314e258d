//! Edge node
//!
//! The directory a signaling layer works against: one endpoint per stream,
//! and a record of which stream each viewer session is attached to.
//!
//! ```text
//!   view(stream, session) ──► endpoint for stream (created on first view)
//!                                  │
//!                                  └──► attach(session, audio sink, video sink)
//!                                              │
//!   Subscription { audio rx, video rx } ◄──────┘
//! ```

pub mod config;
pub mod store;

pub use config::NodeConfig;
pub use store::{EdgeNode, Subscription};
