//! Control-plane boundary
//!
//! The origin server starts and stops forwarding a stream to this node on
//! request. Endpoints only depend on the [`ControlPlane`] trait;
//! [`HttpControlPlane`] is the implementation that speaks to a real
//! origin.

pub mod config;
pub mod description;
pub mod error;
pub mod http;

#[cfg(test)]
pub(crate) mod mock;

use std::future::Future;

pub use config::ControlPlaneConfig;
pub use description::MediaDescription;
pub use error::ControlPlaneError;
pub use http::HttpControlPlane;

/// Requests the origin's forwarding on and off
pub trait ControlPlane: Send + Sync + 'static {
    /// Ask `origin` to forward `stream_id` to the ports in `description`
    ///
    /// Returns the forwarder handle required for teardown.
    fn provision(
        &self,
        origin: &str,
        stream_id: &str,
        description: &MediaDescription,
    ) -> impl Future<Output = Result<String, ControlPlaneError>> + Send;

    /// Ask `origin` to stop the forwarder created by `provision`
    fn teardown(
        &self,
        origin: &str,
        stream_id: &str,
        forwarder_id: &str,
    ) -> impl Future<Output = Result<(), ControlPlaneError>> + Send;
}
