//! Publisher role manager
//!
//! The camera side: register a publishable identity, go live, and track
//! which viewers are connected. A thin reactive wrapper — every state
//! change arrives as a coordinator event, and every action goes through
//! the coordinator. No wire access, no registry mutation.

use std::sync::{Arc, RwLock};

use tokio::task::JoinHandle;

use crate::coordinator::{CoordinatorEvent, SessionCoordinator};
use crate::error::{IdentityError, Result};

/// Locally observable publisher state
#[derive(Debug, Clone, Default)]
pub struct PublisherState {
    /// Transport connectivity
    pub is_connected: bool,
    /// Whether the camera is live
    pub is_publishing: bool,
    /// Viewers currently connected to this camera
    pub connected_viewers: Vec<String>,
    /// The registered identity, if any
    pub camera_id: Option<String>,
}

/// Camera-side session manager
pub struct PublisherSession {
    coordinator: Arc<SessionCoordinator>,
    state: Arc<RwLock<PublisherState>>,
    task: JoinHandle<()>,
}

impl PublisherSession {
    /// Create a publisher manager bound to the coordinator.
    pub fn new(coordinator: Arc<SessionCoordinator>) -> Self {
        let state = Arc::new(RwLock::new(PublisherState {
            is_connected: coordinator.is_connected(),
            ..Default::default()
        }));

        let task = Self::spawn_listener(&coordinator, &state);

        Self {
            coordinator,
            state,
            task,
        }
    }

    fn spawn_listener(
        coordinator: &Arc<SessionCoordinator>,
        state: &Arc<RwLock<PublisherState>>,
    ) -> JoinHandle<()> {
        let mut events = coordinator.subscribe();
        let state = Arc::clone(state);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => Self::apply_event(&state, event),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped = skipped, "Publisher state lagged behind events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn apply_event(state: &Arc<RwLock<PublisherState>>, event: CoordinatorEvent) {
        let mut state = state.write().unwrap();

        match event {
            CoordinatorEvent::ConnectionChanged { connected, .. } => {
                state.is_connected = connected;
                if !connected {
                    // Identities die with the transport
                    state.is_publishing = false;
                    state.connected_viewers.clear();
                    state.camera_id = None;
                }
            }
            CoordinatorEvent::CameraListChanged(cameras) => {
                let Some(id) = state.camera_id.clone() else {
                    return;
                };
                if let Some(camera) = cameras.iter().find(|c| c.id == id) {
                    let mut viewers: Vec<String> = camera.viewers.iter().cloned().collect();
                    viewers.sort();
                    state.connected_viewers = viewers;
                    state.is_publishing = camera.is_streaming();
                }
            }
            _ => {}
        }
    }

    /// Register a publishable identity. Fails if one is already held.
    pub async fn register_identity(&self, name: &str) -> Result<String> {
        if let Some(existing) = self.state.read().unwrap().camera_id.clone() {
            return Err(IdentityError::AlreadyRegistered(existing).into());
        }

        let id = self.coordinator.register_camera(name).await?;
        self.state.write().unwrap().camera_id = Some(id.clone());
        Ok(id)
    }

    /// Go live.
    pub async fn start_publishing(&self) -> Result<()> {
        let Some(id) = self.state.read().unwrap().camera_id.clone() else {
            return Err(IdentityError::NotRegistered.into());
        };

        self.coordinator.start_publishing(&id).await?;
        self.state.write().unwrap().is_publishing = true;
        Ok(())
    }

    /// Stop publishing. A no-op when the camera is not live or no
    /// identity is registered.
    pub async fn stop_publishing(&self) {
        let Some(id) = self.state.read().unwrap().camera_id.clone() else {
            return;
        };

        self.coordinator.stop_publishing(&id).await;
        let mut state = self.state.write().unwrap();
        state.is_publishing = false;
        state.connected_viewers.clear();
    }

    /// Withdraw the identity entirely.
    pub async fn unregister(&self) {
        let Some(id) = self.state.write().unwrap().camera_id.take() else {
            return;
        };
        self.coordinator.unregister_camera(&id).await;

        let mut state = self.state.write().unwrap();
        state.is_publishing = false;
        state.connected_viewers.clear();
    }

    /// Snapshot of the observable state.
    pub fn state(&self) -> PublisherState {
        self.state.read().unwrap().clone()
    }
}

impl Drop for PublisherSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}
