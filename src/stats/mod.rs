//! Statistics and counters

pub mod metrics;

pub use metrics::{CoordinationStats, TransportStats};
