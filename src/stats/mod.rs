//! Relay statistics

pub mod metrics;

pub use metrics::{EndpointStats, FanOutStats, ListenerCounters, ListenerStats};
