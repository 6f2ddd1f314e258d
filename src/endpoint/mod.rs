//! Relay endpoints
//!
//! An endpoint ties together everything one upstream stream needs: a port
//! lease, the forwarding set up at the origin, and the fan-out relay that
//! viewer sessions attach to.
//!
//! ```text
//!   create ──► acquire lease ──► provision at origin ──► start relay
//!                   │                    │
//!                   └──── released ◄─────┘ (on failure)
//!
//!   close  ──► stop listeners ──► stop owners ──► release lease ──► teardown
//! ```
//!
//! Each endpoint is driven by one lifecycle task. [`RelayEndpoint`] is a
//! cloneable handle that sends commands to it.

pub mod config;
pub mod handle;
pub mod state;

pub use config::EndpointConfig;
pub use handle::RelayEndpoint;
pub use state::EndpointPhase;
