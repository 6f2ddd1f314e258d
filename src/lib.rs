//! Edge relay node for live RTP streams
//!
//! An origin server forwards a stream's RTP packets over UDP to this node,
//! which fans them out to any number of viewer sessions. A control plane
//! asks the origin to start and stop forwarding as streams are needed.
//!
//! The crate is built from a few single-owner tasks that only talk over
//! bounded channels:
//!
//! - [`allocator::PortAllocator`] hands out blocks of three UDP sockets
//!   (audio, video, secondary video) and takes them back.
//! - [`relay::StreamRelay`] runs one listener per socket and one
//!   [`relay::FanOut`] owner per media type that holds the subscriber set.
//! - [`endpoint::RelayEndpoint`] binds a lease, an origin forward and a
//!   relay together, exposing `create`, `attach`, `detach` and `close`.
//! - [`node::EdgeNode`] keeps the stream and session directory used by a
//!   signaling layer.
//!
//! # Example
//!
//! ```no_run
//! use edge_relay::node::{EdgeNode, NodeConfig};
//!
//! # async fn example() -> edge_relay::Result<()> {
//! let node = EdgeNode::new(NodeConfig::with_origin("10.0.0.1:8080"))?;
//!
//! let mut viewer = node.view("stream-1", "session-1").await?;
//! while let Some(packet) = viewer.video.recv().await {
//!     // hand the RTP packet to the peer connection
//!     let _ = packet;
//! }
//!
//! node.leave("session-1").await;
//! node.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod allocator;
pub mod control;
pub mod endpoint;
pub mod error;
pub mod node;
pub mod relay;
pub mod stats;

pub use allocator::{AllocatorConfig, LeaseSocket, PortAllocator, PortLease};
pub use control::{ControlPlane, HttpControlPlane, MediaDescription};
pub use endpoint::{EndpointConfig, EndpointPhase, RelayEndpoint};
pub use error::{Error, Result};
pub use node::{EdgeNode, NodeConfig, Subscription};
pub use relay::{DatagramSource, FanOut, Frame, MediaKind, RelayConfig, Sink, StreamRelay};
