//! Client-side roles and wiring
//!
//! Provides:
//! - the assembled [`CamlinkClient`] context,
//! - the camera-side [`PublisherSession`] manager,
//! - the viewer-side [`ViewerSession`] manager.

pub mod core;
pub mod publisher;
pub mod viewer;

pub use self::core::{CamlinkClient, ClientConfig};
pub use publisher::{PublisherSession, PublisherState};
pub use viewer::{ViewerSession, ViewerState};
