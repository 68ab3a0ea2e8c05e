//! Viewer role manager
//!
//! The subscriber side: discover a camera identity, join its stream, and
//! leave again. Reactive wrapper over the coordinator, same as the
//! publisher manager. The viewer's own identity is generated once at
//! construction.

use std::sync::{Arc, RwLock};

use tokio::task::JoinHandle;

use crate::coordinator::{CoordinatorEvent, SessionCoordinator};
use crate::error::{IdentityError, Result};
use crate::protocol::{generate_device_id, session_id_for};
use crate::registry::Session;

/// Locally observable viewer state
#[derive(Debug, Clone, Default)]
pub struct ViewerState {
    /// Transport connectivity
    pub is_connected: bool,
    /// Camera this viewer is attached to
    pub connected_camera: Option<String>,
    /// Whether a watch session is active
    pub is_watching: bool,
}

/// Viewer-side session manager
pub struct ViewerSession {
    coordinator: Arc<SessionCoordinator>,
    viewer_id: String,
    state: Arc<RwLock<ViewerState>>,
    task: JoinHandle<()>,
}

impl ViewerSession {
    /// Create a viewer manager with a fresh viewer identity.
    pub fn new(coordinator: Arc<SessionCoordinator>) -> Self {
        let viewer_id = generate_device_id("viewer");
        let state = Arc::new(RwLock::new(ViewerState {
            is_connected: coordinator.is_connected(),
            ..Default::default()
        }));

        let task = Self::spawn_listener(&coordinator, &state, &viewer_id);

        Self {
            coordinator,
            viewer_id,
            state,
            task,
        }
    }

    fn spawn_listener(
        coordinator: &Arc<SessionCoordinator>,
        state: &Arc<RwLock<ViewerState>>,
        viewer_id: &str,
    ) -> JoinHandle<()> {
        let mut events = coordinator.subscribe();
        let state = Arc::clone(state);
        let viewer_id = viewer_id.to_string();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => Self::apply_event(&state, &viewer_id, event),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped = skipped, "Viewer state lagged behind events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn apply_event(state: &Arc<RwLock<ViewerState>>, viewer_id: &str, event: CoordinatorEvent) {
        let mut state = state.write().unwrap();

        match event {
            CoordinatorEvent::ConnectionChanged { connected, .. } => {
                state.is_connected = connected;
                if !connected {
                    state.is_watching = false;
                    state.connected_camera = None;
                }
            }
            CoordinatorEvent::SessionEnded {
                viewer_id: ended_viewer,
                ..
            } if ended_viewer == viewer_id => {
                state.is_watching = false;
            }
            _ => {}
        }
    }

    /// This viewer's generated identity.
    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    /// Attach to a camera by id.
    ///
    /// Fails with `NotConnected` when the transport is down (connecting
    /// the transport is an explicit, caller-driven step) and with
    /// `CameraNotFound` when the id is not in the registry.
    pub async fn connect_to_camera(&self, camera_id: &str) -> Result<bool> {
        if !self.coordinator.is_connected() {
            return Err(IdentityError::NotConnected.into());
        }
        if self.coordinator.registry().get_camera(camera_id).await.is_none() {
            return Err(IdentityError::CameraNotFound(camera_id.to_string()).into());
        }

        self.state.write().unwrap().connected_camera = Some(camera_id.to_string());
        Ok(true)
    }

    /// Join a camera's stream. Implicitly attaches to the camera.
    pub async fn start_watching(&self, camera_id: &str) -> Result<Session> {
        let session = self
            .coordinator
            .start_watching(camera_id, &self.viewer_id)
            .await?;

        let mut state = self.state.write().unwrap();
        state.connected_camera = Some(camera_id.to_string());
        state.is_watching = true;
        Ok(session)
    }

    /// Leave the current stream. A no-op when nothing is being watched.
    pub async fn stop_watching(&self) {
        let camera = {
            let mut state = self.state.write().unwrap();
            if !state.is_watching {
                return;
            }
            state.is_watching = false;
            state.connected_camera.clone()
        };

        if let Some(camera_id) = camera {
            let session_id = session_id_for(&camera_id, &self.viewer_id);
            self.coordinator.stop_session(&session_id).await;
        }
    }

    /// Detach from the camera entirely.
    pub async fn disconnect(&self) {
        self.stop_watching().await;
        self.state.write().unwrap().connected_camera = None;
    }

    /// Snapshot of the observable state.
    pub fn state(&self) -> ViewerState {
        self.state.read().unwrap().clone()
    }
}

impl Drop for ViewerSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}
