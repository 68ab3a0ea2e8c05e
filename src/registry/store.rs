//! Session registry
//!
//! In-memory maps of known cameras and active sessions. Purely transient:
//! the contents are only meaningful while the transport is live, and the
//! whole registry is cleared on disconnect.
//!
//! Mutation goes through the session coordinator alone (single-writer
//! discipline); role managers and UI code read snapshots.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::camera::CameraIdentity;
use super::session::Session;

/// Central in-memory registry of cameras and sessions
pub struct SessionRegistry {
    cameras: RwLock<HashMap<String, CameraIdentity>>,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            cameras: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace a camera identity.
    pub async fn upsert_camera(&self, camera: CameraIdentity) {
        tracing::debug!(camera = %camera.id, status = ?camera.status, "Camera upserted");
        self.cameras.write().await.insert(camera.id.clone(), camera);
    }

    /// Remove a camera identity.
    pub async fn remove_camera(&self, id: &str) -> Option<CameraIdentity> {
        let removed = self.cameras.write().await.remove(id);
        if removed.is_some() {
            tracing::debug!(camera = %id, "Camera removed");
        }
        removed
    }

    /// Snapshot of a single camera.
    pub async fn get_camera(&self, id: &str) -> Option<CameraIdentity> {
        self.cameras.read().await.get(id).cloned()
    }

    /// Snapshot of all known cameras.
    pub async fn list_cameras(&self) -> Vec<CameraIdentity> {
        self.cameras.read().await.values().cloned().collect()
    }

    /// Apply a mutation to a camera in place. Returns the updated
    /// snapshot, or `None` if the camera is unknown.
    pub async fn update_camera<F>(&self, id: &str, mutate: F) -> Option<CameraIdentity>
    where
        F: FnOnce(&mut CameraIdentity),
    {
        let mut cameras = self.cameras.write().await;
        let camera = cameras.get_mut(id)?;
        mutate(camera);
        Some(camera.clone())
    }

    /// Insert or replace a session record.
    pub async fn upsert_session(&self, session: Session) {
        tracing::debug!(
            session = %session.session_id,
            state = ?session.state,
            "Session upserted"
        );
        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session);
    }

    /// Remove a session record.
    pub async fn remove_session(&self, session_id: &str) -> Option<Session> {
        let removed = self.sessions.write().await.remove(session_id);
        if removed.is_some() {
            tracing::debug!(session = %session_id, "Session removed");
        }
        removed
    }

    /// Snapshot of a single session.
    pub async fn get_session(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Snapshot of all sessions.
    pub async fn list_sessions(&self) -> Vec<Session> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Apply a mutation to a session in place. Returns the updated
    /// snapshot, or `None` if the session is unknown.
    pub async fn update_session<F>(&self, session_id: &str, mutate: F) -> Option<Session>
    where
        F: FnOnce(&mut Session),
    {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(session_id)?;
        mutate(session);
        Some(session.clone())
    }

    /// Sessions referencing the given camera.
    pub async fn sessions_for_camera(&self, camera_id: &str) -> Vec<Session> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.camera_id == camera_id)
            .cloned()
            .collect()
    }

    /// Number of sessions in a non-terminal state.
    pub async fn active_session_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.is_active())
            .count()
    }

    /// Drop everything. Called on transport disconnect — cameras and
    /// sessions are only meaningful while the socket is live.
    pub async fn clear_all(&self) {
        let cameras = std::mem::take(&mut *self.cameras.write().await);
        let sessions = std::mem::take(&mut *self.sessions.write().await);

        if !cameras.is_empty() || !sessions.is_empty() {
            tracing::info!(
                cameras = cameras.len(),
                sessions = sessions.len(),
                "Registry cleared"
            );
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
