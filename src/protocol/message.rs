//! Signaling wire messages
//!
//! Every frame on the signaling socket is a JSON envelope `{type, data}`.
//! The vocabulary is a closed set, modeled as one adjacently tagged enum so
//! a mismatched payload shape fails at decode time instead of deep inside a
//! handler. Negotiation payloads (`webrtc_signaling`) are opaque: the
//! coordinator relays them verbatim and never inspects their contents.
//!
//! The socket is shared with non-streaming concerns (`event`,
//! `notification`); frames whose type is outside this vocabulary must be
//! skipped by the receiver, never treated as a protocol violation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Camera visibility status as pushed by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraStatus {
    /// Registered and reachable
    Online,
    /// Withdrawn or unreachable
    Offline,
    /// Actively publishing media
    Streaming,
}

/// Camera identity as carried on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    pub id: String,
    pub name: String,
    pub status: CameraStatus,
}

/// Server-side view of an established camera/viewer pairing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConnection {
    pub session_id: String,
    pub camera_id: String,
    pub viewer_id: String,
}

/// Negotiation payload kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
    StreamStart,
    StreamStop,
}

/// Opaque negotiation relay envelope
///
/// `payload` is whatever the media transport on one side produced for the
/// other; it passes through the coordination layer untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalingMessage {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub from: String,
    pub to: String,
    pub payload: Value,
}

/// The signaling vocabulary
///
/// Serialized as `{"type": "<snake_case tag>", "data": {...}}` with
/// camelCase data fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WireMessage {
    /// Publish a camera identity (client → server)
    #[serde(rename_all = "camelCase")]
    RegisterCamera {
        id: String,
        name: String,
        timestamp: u64,
    },

    /// Withdraw a camera identity (client → server)
    #[serde(rename_all = "camelCase")]
    UnregisterCamera { id: String },

    /// A camera identity became visible (server → client)
    CameraConnected(CameraInfo),

    /// A camera identity was withdrawn (server → client)
    #[serde(rename_all = "camelCase")]
    CameraDisconnected { id: String },

    /// Publisher goes live (client → server)
    #[serde(rename_all = "camelCase")]
    StartStream { camera_id: String, timestamp: u64 },

    /// Viewer asks to join a camera's stream (client → server)
    #[serde(rename_all = "camelCase")]
    JoinStream {
        camera_id: String,
        viewer_id: String,
        timestamp: u64,
    },

    /// Publisher ends its stream (client → server)
    #[serde(rename_all = "camelCase")]
    StopStream {
        camera_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        viewer_id: Option<String>,
    },

    /// Viewer leaves a session (client → server)
    #[serde(rename_all = "camelCase")]
    LeaveStream {
        camera_id: String,
        viewer_id: String,
    },

    /// Session lifecycle ack (server → client)
    StreamStarted(StreamConnection),

    /// Session lifecycle ack (server → client)
    #[serde(rename_all = "camelCase")]
    StreamStopped { session_id: String },

    /// Membership change (server → client)
    #[serde(rename_all = "camelCase")]
    ViewerJoined {
        camera_id: String,
        viewer_id: String,
    },

    /// Membership change (server → client)
    #[serde(rename_all = "camelCase")]
    ViewerLeft {
        camera_id: String,
        viewer_id: String,
    },

    /// Opaque negotiation relay (both directions)
    WebrtcSignaling(SignalingMessage),

    /// Non-streaming event multiplexed on the same socket
    Event(Value),

    /// Non-streaming notification multiplexed on the same socket
    Notification(Value),
}

impl WireMessage {
    /// Serialize to the `{type, data}` JSON envelope.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Decode a text frame.
    ///
    /// Frames outside the vocabulary fail here; callers are expected to
    /// log and skip them.
    pub fn decode(text: &str) -> serde_json::Result<WireMessage> {
        serde_json::from_str(text)
    }

    /// The wire tag, for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            WireMessage::RegisterCamera { .. } => "register_camera",
            WireMessage::UnregisterCamera { .. } => "unregister_camera",
            WireMessage::CameraConnected(_) => "camera_connected",
            WireMessage::CameraDisconnected { .. } => "camera_disconnected",
            WireMessage::StartStream { .. } => "start_stream",
            WireMessage::JoinStream { .. } => "join_stream",
            WireMessage::StopStream { .. } => "stop_stream",
            WireMessage::LeaveStream { .. } => "leave_stream",
            WireMessage::StreamStarted(_) => "stream_started",
            WireMessage::StreamStopped { .. } => "stream_stopped",
            WireMessage::ViewerJoined { .. } => "viewer_joined",
            WireMessage::ViewerLeft { .. } => "viewer_left",
            WireMessage::WebrtcSignaling(_) => "webrtc_signaling",
            WireMessage::Event(_) => "event",
            WireMessage::Notification(_) => "notification",
        }
    }
}
