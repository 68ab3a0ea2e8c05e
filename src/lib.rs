//! camlink — camera/viewer streaming session coordination
//!
//! A client-side coordination library pairing two device roles — a
//! "camera" publishing media and one or more "viewers" subscribing to it —
//! over a signaling server, with the actual peer-to-peer media transport
//! delegated to an injected capability.
//!
//! What lives here:
//! - a persistent signaling socket with reconnect-and-backoff
//!   ([`transport`]),
//! - the JSON wire vocabulary and identity generation ([`protocol`]),
//! - in-memory camera/session registry and the per-session state machine
//!   ([`registry`]),
//! - the coordinator that drives it all ([`coordinator`]),
//! - role managers and the assembled client context ([`client`]),
//! - the media capability seam with a simulated backend ([`media`]).
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use camlink::client::{CamlinkClient, ClientConfig};
//! use camlink::media::SimulatedMedia;
//!
//! # async fn example() {
//! let client = CamlinkClient::new(
//!     ClientConfig::with_url("ws://192.168.1.10:8787/ws"),
//!     Arc::new(SimulatedMedia::new()),
//! );
//!
//! client.connect().await;
//!
//! let viewer = client.viewer();
//! if viewer.connect_to_camera("MIMO_1723456789_a1b2c3").await.is_ok() {
//!     viewer.start_watching("MIMO_1723456789_a1b2c3").await.ok();
//! }
//! # }
//! ```

pub mod client;
pub mod coordinator;
pub mod error;
pub mod media;
pub mod protocol;
pub mod registry;
pub mod stats;
pub mod transport;

pub use client::{CamlinkClient, ClientConfig};
pub use coordinator::{CoordinatorEvent, SessionCoordinator};
pub use error::{Error, Result};
pub use media::{MediaAdapter, SimulatedMedia};
pub use registry::{CameraIdentity, Session, SessionRegistry, SessionState};
pub use transport::{SignalSocket, TransportConfig};
