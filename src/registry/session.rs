//! Session records and lifecycle
//!
//! One session per camera/viewer pairing, keyed by the deterministic
//! composite id. State moves strictly forward; `Disconnected` and `Error`
//! are terminal and the record is dropped from the registry once the
//! owning role manager has been told.

use std::time::Instant;

use crate::protocol::session_id_for;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Join/publish request issued, waiting for peer confirmation
    Connecting,
    /// Peer confirmed, negotiation under way
    Connected,
    /// Media is flowing
    Streaming,
    /// Explicitly stopped (terminal)
    Disconnected,
    /// Failed (terminal)
    Error,
}

/// One camera/viewer streaming relationship
#[derive(Debug, Clone)]
pub struct Session {
    /// Deterministic composite id: `<cameraId>_<viewerId>`
    pub session_id: String,

    /// Publishing side
    pub camera_id: String,

    /// Subscribing side
    pub viewer_id: String,

    /// Current lifecycle state
    pub state: SessionState,

    /// When the session was created
    pub started_at: Instant,

    /// Last error, for terminal `Error` records
    pub last_error: Option<String>,
}

impl Session {
    /// Create a new session in `Connecting`.
    pub fn new(camera_id: impl Into<String>, viewer_id: impl Into<String>) -> Self {
        let camera_id = camera_id.into();
        let viewer_id = viewer_id.into();

        Self {
            session_id: session_id_for(&camera_id, &viewer_id),
            camera_id,
            viewer_id,
            state: SessionState::Connecting,
            started_at: Instant::now(),
            last_error: None,
        }
    }

    /// Peer confirmed: connecting → connected.
    pub fn mark_connected(&mut self) {
        if self.state == SessionState::Connecting {
            self.state = SessionState::Connected;
        }
    }

    /// Media flowing: connected → streaming.
    pub fn mark_streaming(&mut self) {
        if self.state == SessionState::Connected {
            self.state = SessionState::Streaming;
        }
    }

    /// Explicit stop: connected/streaming → disconnected.
    ///
    /// A still-connecting session goes straight to `Disconnected` too —
    /// the caller asked for it, that is not an error.
    pub fn mark_stopped(&mut self) {
        if !self.is_terminal() {
            self.state = SessionState::Disconnected;
        }
    }

    /// Failure: any active state → error, recording the reason.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if !self.is_terminal() {
            self.state = SessionState::Error;
            self.last_error = Some(reason.into());
        }
    }

    /// Whether the session is in an active (non-terminal) state.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            SessionState::Connecting | SessionState::Connected | SessionState::Streaming
        )
    }

    /// Whether the session has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, SessionState::Disconnected | SessionState::Error)
    }

    /// Session age.
    pub fn duration(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}
