//! Coordinator events
//!
//! The closed set of notifications the coordination core emits toward
//! role managers and UI code. Everything observable flows through these
//! variants; nothing downstream reads the registry directly.

use serde_json::Value;

use crate::media::MediaHandle;
use crate::registry::{CameraIdentity, Session};

/// Why a session record went away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEndReason {
    /// Explicit stop request
    Stopped,
    /// Session-level failure (negotiation, peer left, transport loss)
    Failed(String),
}

/// Notifications from the session coordinator
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    /// Transport connectivity changed
    ConnectionChanged {
        connected: bool,
        last_error: Option<String>,
    },

    /// The set of known cameras (or their membership) changed
    CameraListChanged(Vec<CameraIdentity>),

    /// An active session moved to a new state
    SessionChanged(Session),

    /// A session reached a terminal state and was removed
    SessionEnded {
        session_id: String,
        camera_id: String,
        viewer_id: String,
        reason: SessionEndReason,
    },

    /// Remote media is available for rendering
    RemoteMedia {
        session_id: String,
        handle: MediaHandle,
    },

    /// Non-streaming event multiplexed over the signaling socket
    ServerEvent(Value),

    /// Non-streaming notification multiplexed over the signaling socket
    ServerNotification(Value),
}
