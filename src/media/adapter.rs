//! Media capability seam
//!
//! The narrow interface between the coordination core and the real media
//! transport. The core never touches SDP, ICE, or media bytes — it calls
//! these entry points and relays opaque negotiation payloads between
//! peers. Backends are injected, never hardcoded, so the coordinator can
//! be exercised against a fake in tests.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::MediaError;

/// Opaque handle to a local or remote media resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaHandle {
    /// Backend-assigned identifier
    pub id: String,
}

impl MediaHandle {
    /// Wrap a backend identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Events reported by a media backend
#[derive(Debug, Clone)]
pub enum MediaEvent {
    /// Media is flowing for the session (drives connected → streaming)
    MediaFlowing { session_id: String },

    /// A remote media handle became available for rendering
    RemoteMediaAvailable {
        session_id: String,
        handle: MediaHandle,
    },

    /// The backend tore down the session's resources
    SessionEnded { session_id: String },
}

/// The media transport capability
///
/// Every call is non-blocking from the coordinator's point of view;
/// CPU- or I/O-heavy negotiation work happens inside the backend.
#[async_trait]
pub trait MediaAdapter: Send + Sync {
    /// Acquire the local capture resource.
    ///
    /// Fails with [`MediaError::CaptureUnavailable`] when hardware or
    /// permission is inaccessible.
    async fn initialize_local_capture(&self) -> Result<MediaHandle, MediaError>;

    /// Start publishing the local capture for a session.
    ///
    /// Fails with [`MediaError::NegotiationFailed`] on rejection or
    /// timeout.
    async fn begin_publish(
        &self,
        session_id: &str,
        local: &MediaHandle,
    ) -> Result<(), MediaError>;

    /// Start subscribing to a session's remote media.
    ///
    /// On success the backend eventually emits
    /// [`MediaEvent::RemoteMediaAvailable`].
    async fn begin_subscribe(&self, session_id: &str) -> Result<(), MediaError>;

    /// Feed an inbound negotiation payload to the backend.
    ///
    /// A payload for an unknown session id is dropped with a logged
    /// warning, never an error.
    async fn relay_signal(&self, session_id: &str, payload: Value);

    /// Tear down one session's local resources. Never affects siblings.
    async fn end_session(&self, session_id: &str);

    /// Tear down every session and release the local capture. Called on
    /// transport disconnect or app teardown.
    async fn cleanup_all(&self);

    /// Subscribe to backend events.
    fn events(&self) -> broadcast::Receiver<MediaEvent>;
}
