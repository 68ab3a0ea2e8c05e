//! Simulated media backend
//!
//! A timer-driven stand-in for the real peer-to-peer transport:
//! negotiation is a configurable delay, remote media is a synthetic
//! handle. Useful for demos and for exercising the coordinator without
//! camera hardware. The negotiation ceiling applies here the same way it
//! would in a real backend.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::MediaError;

use super::adapter::{MediaAdapter, MediaEvent, MediaHandle};

/// Simulated backend options
#[derive(Debug, Clone)]
pub struct SimulatedMediaConfig {
    /// How long the fake negotiation takes
    pub negotiation_delay: Duration,

    /// Ceiling on negotiation; exceeding it fails the session
    pub negotiation_timeout: Duration,

    /// Force capture acquisition to fail
    pub fail_capture: bool,

    /// Force negotiation to fail
    pub fail_negotiation: bool,
}

impl Default for SimulatedMediaConfig {
    fn default() -> Self {
        Self {
            negotiation_delay: Duration::from_millis(100),
            negotiation_timeout: Duration::from_secs(15),
            fail_capture: false,
            fail_negotiation: false,
        }
    }
}

/// Timer-driven media backend
pub struct SimulatedMedia {
    config: SimulatedMediaConfig,
    sessions: Mutex<HashSet<String>>,
    events: broadcast::Sender<MediaEvent>,
}

impl SimulatedMedia {
    /// Create a backend with default timing
    pub fn new() -> Self {
        Self::with_config(SimulatedMediaConfig::default())
    }

    /// Create a backend with custom options
    pub fn with_config(config: SimulatedMediaConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            config,
            sessions: Mutex::new(HashSet::new()),
            events,
        }
    }

    /// Number of sessions the backend currently tracks
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    async fn negotiate(&self, session_id: &str) -> Result<(), MediaError> {
        self.sessions.lock().unwrap().insert(session_id.to_string());

        let settled = tokio::time::timeout(
            self.config.negotiation_timeout,
            tokio::time::sleep(self.config.negotiation_delay),
        )
        .await;

        if settled.is_err() {
            self.sessions.lock().unwrap().remove(session_id);
            return Err(MediaError::NegotiationFailed("negotiation timed out".into()));
        }

        if self.config.fail_negotiation {
            self.sessions.lock().unwrap().remove(session_id);
            return Err(MediaError::NegotiationFailed("peer rejected".into()));
        }

        Ok(())
    }

    fn emit(&self, event: MediaEvent) {
        let _ = self.events.send(event);
    }
}

impl Default for SimulatedMedia {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaAdapter for SimulatedMedia {
    async fn initialize_local_capture(&self) -> Result<MediaHandle, MediaError> {
        if self.config.fail_capture {
            return Err(MediaError::CaptureUnavailable(
                "no capture device".into(),
            ));
        }
        Ok(MediaHandle::new("local_capture"))
    }

    async fn begin_publish(
        &self,
        session_id: &str,
        _local: &MediaHandle,
    ) -> Result<(), MediaError> {
        self.negotiate(session_id).await?;

        tracing::debug!(session = %session_id, "Simulated publish negotiated");
        self.emit(MediaEvent::MediaFlowing {
            session_id: session_id.to_string(),
        });
        Ok(())
    }

    async fn begin_subscribe(&self, session_id: &str) -> Result<(), MediaError> {
        self.negotiate(session_id).await?;

        tracing::debug!(session = %session_id, "Simulated subscribe negotiated");
        self.emit(MediaEvent::RemoteMediaAvailable {
            session_id: session_id.to_string(),
            handle: MediaHandle::new(format!("remote_{}", session_id)),
        });
        self.emit(MediaEvent::MediaFlowing {
            session_id: session_id.to_string(),
        });
        Ok(())
    }

    async fn relay_signal(&self, session_id: &str, _payload: Value) {
        if !self.sessions.lock().unwrap().contains(session_id) {
            tracing::warn!(session = %session_id, "Signal for unknown session dropped");
            return;
        }
        tracing::trace!(session = %session_id, "Signal relayed to backend");
    }

    async fn end_session(&self, session_id: &str) {
        if self.sessions.lock().unwrap().remove(session_id) {
            tracing::debug!(session = %session_id, "Simulated session ended");
            self.emit(MediaEvent::SessionEnded {
                session_id: session_id.to_string(),
            });
        }
    }

    async fn cleanup_all(&self) {
        let drained: Vec<String> = self.sessions.lock().unwrap().drain().collect();
        if !drained.is_empty() {
            tracing::info!(sessions = drained.len(), "Simulated media cleaned up");
        }
        for session_id in drained {
            self.emit(MediaEvent::SessionEnded { session_id });
        }
    }

    fn events(&self) -> broadcast::Receiver<MediaEvent> {
        self.events.subscribe()
    }
}
