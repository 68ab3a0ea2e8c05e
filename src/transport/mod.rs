//! Transport to the coordination server
//!
//! A single persistent WebSocket shared by the streaming coordinator and
//! unrelated concerns, with reconnect-with-backoff, plus the one-shot
//! LAN discovery resolver that finds the server before the first connect.

pub mod backoff;
pub mod config;
pub mod discovery;
pub mod socket;

pub use config::TransportConfig;
pub use discovery::{discover_server, DiscoveryConfig, DiscoveryResult};
pub use socket::{ConnectionState, ConnectionStatus, SignalSocket, TransportEvent};
