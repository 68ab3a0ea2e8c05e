//! Camera identity records
//!
//! The registry's view of a publishable camera: its opaque id, human
//! label, visibility status, and the set of viewers currently subscribed.

use std::collections::HashSet;

use crate::protocol::{CameraInfo, CameraStatus};

/// A known camera identity
#[derive(Debug, Clone, PartialEq)]
pub struct CameraIdentity {
    /// Opaque unique id, generated client-side at registration time
    pub id: String,

    /// Human label
    pub display_name: String,

    /// Current visibility status
    pub status: CameraStatus,

    /// Viewer ids currently subscribed
    pub viewers: HashSet<String>,
}

impl CameraIdentity {
    /// Create a fresh identity in the given status with no viewers.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, status: CameraStatus) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            status,
            viewers: HashSet::new(),
        }
    }

    /// Build from a server-pushed wire record.
    pub fn from_wire(info: CameraInfo) -> Self {
        Self::new(info.id, info.name, info.status)
    }

    /// Record a viewer joining. Later membership messages win, so a
    /// re-join after a leave puts the viewer back.
    pub fn add_viewer(&mut self, viewer_id: impl Into<String>) {
        self.viewers.insert(viewer_id.into());
    }

    /// Record a viewer leaving.
    pub fn remove_viewer(&mut self, viewer_id: &str) {
        self.viewers.remove(viewer_id);
    }

    /// Number of subscribed viewers.
    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    /// Whether the camera is actively publishing.
    pub fn is_streaming(&self) -> bool {
        self.status == CameraStatus::Streaming
    }
}
