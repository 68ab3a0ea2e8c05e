//! Signaling protocol
//!
//! The JSON wire vocabulary spoken over the coordination socket, plus
//! client-side identity generation. Identities are opaque strings; session
//! ids are the deterministic composite of the camera and viewer ids.

pub mod identity;
pub mod message;

pub use identity::{generate_device_id, session_id_for, unix_millis};
pub use message::{
    CameraInfo, CameraStatus, SignalKind, SignalingMessage, StreamConnection, WireMessage,
};
