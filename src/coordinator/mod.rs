//! Session coordination
//!
//! The state machine that interprets signaling messages, drives session
//! lifecycles, and mediates between the transport socket and the media
//! capability. Sole writer of the session registry.

pub mod engine;
pub mod events;

pub use engine::{CoordinatorConfig, SessionCoordinator};
pub use events::{CoordinatorEvent, SessionEndReason};
