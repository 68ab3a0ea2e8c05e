//! Session coordinator
//!
//! The state machine at the center of the crate. The coordinator is the
//! single writer of the session registry: it interprets inbound signaling
//! messages, drives session state transitions, invokes the media
//! capability at the right moments, and decides what goes back over the
//! wire. Outbound messages leave through an injected channel, so the
//! whole machine can be exercised in tests without a live socket.
//!
//! Media errors never escape: every failed adapter call becomes an error
//! transition on the one session it concerns.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};

use crate::error::{Error, IdentityError, Result};
use crate::media::{MediaAdapter, MediaEvent, MediaHandle};
use crate::protocol::{
    generate_device_id, session_id_for, unix_millis, CameraStatus, SignalingMessage, WireMessage,
};
use crate::registry::{CameraIdentity, Session, SessionRegistry};
use crate::stats::CoordinationStats;
use crate::transport::TransportEvent;

use super::events::{CoordinatorEvent, SessionEndReason};

/// Coordinator options
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Prefix for generated camera identities
    pub id_prefix: String,

    /// Capacity of the coordinator event channel
    pub event_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            id_prefix: "cam".into(),
            event_capacity: 256,
        }
    }
}

/// The session coordination state machine
pub struct SessionCoordinator {
    config: CoordinatorConfig,
    registry: Arc<SessionRegistry>,
    media: Arc<dyn MediaAdapter>,
    outbound: mpsc::Sender<WireMessage>,
    events: broadcast::Sender<CoordinatorEvent>,
    connected: AtomicBool,
    /// Camera ids registered by this client (the publisher side)
    local_cameras: Mutex<HashSet<String>>,
    /// Local capture handle, acquired once and shared across sessions
    local_capture: tokio::sync::Mutex<Option<MediaHandle>>,
    sessions_created: AtomicU64,
    sessions_failed: AtomicU64,
    signals_relayed: AtomicU64,
}

impl SessionCoordinator {
    /// Create a coordinator.
    ///
    /// `outbound` is where wire messages destined for the server go; the
    /// owning context pumps it into the signaling socket.
    pub fn new(
        config: CoordinatorConfig,
        registry: Arc<SessionRegistry>,
        media: Arc<dyn MediaAdapter>,
        outbound: mpsc::Sender<WireMessage>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(config.event_capacity);

        Arc::new(Self {
            config,
            registry,
            media,
            outbound,
            events,
            connected: AtomicBool::new(false),
            local_cameras: Mutex::new(HashSet::new()),
            local_capture: tokio::sync::Mutex::new(None),
            sessions_created: AtomicU64::new(0),
            sessions_failed: AtomicU64::new(0),
            signals_relayed: AtomicU64::new(0),
        })
    }

    /// Subscribe to coordinator events.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    /// Whether the transport is currently connected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Registry snapshot access for role managers.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Coordination counters snapshot.
    pub fn stats(&self) -> CoordinationStats {
        CoordinationStats {
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            sessions_failed: self.sessions_failed.load(Ordering::Relaxed),
            signals_relayed: self.signals_relayed.load(Ordering::Relaxed),
        }
    }

    // ---- transport events -------------------------------------------------

    /// Feed one transport event into the state machine. Events must be
    /// delivered in receipt order.
    pub async fn handle_transport_event(self: &Arc<Self>, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                self.connected.store(true, Ordering::Relaxed);
                self.emit(CoordinatorEvent::ConnectionChanged {
                    connected: true,
                    last_error: None,
                });
            }
            TransportEvent::Closed { code, reason } => {
                tracing::info!(code = code, reason = %reason, "Transport closed; resetting coordination state");
                self.handle_disconnect(reason).await;
            }
            TransportEvent::Message(msg) => self.handle_message(msg).await,
            TransportEvent::Error(e) => {
                tracing::debug!(error = %e, "Transport error (close path follows)");
            }
            TransportEvent::Binary(_) => {
                // Binary frames belong to other subsystems
                tracing::trace!("Ignoring binary frame");
            }
        }
    }

    async fn handle_disconnect(self: &Arc<Self>, reason: String) {
        self.connected.store(false, Ordering::Relaxed);

        // Every camera and session is only meaningful while the socket is
        // live. Notify owners, then drop everything.
        for session in self.registry.list_sessions().await {
            if session.is_active() {
                self.sessions_failed.fetch_add(1, Ordering::Relaxed);
                self.emit(CoordinatorEvent::SessionEnded {
                    session_id: session.session_id,
                    camera_id: session.camera_id,
                    viewer_id: session.viewer_id,
                    reason: SessionEndReason::Failed("transport disconnected".into()),
                });
            }
        }

        self.registry.clear_all().await;
        self.local_cameras.lock().unwrap().clear();
        *self.local_capture.lock().await = None;
        self.media.cleanup_all().await;

        self.emit(CoordinatorEvent::CameraListChanged(Vec::new()));
        self.emit(CoordinatorEvent::ConnectionChanged {
            connected: false,
            last_error: (!reason.is_empty()).then_some(reason),
        });
    }

    // ---- inbound messages -------------------------------------------------

    async fn handle_message(self: &Arc<Self>, msg: WireMessage) {
        tracing::trace!(message = msg.type_name(), "Handling signaling message");

        match msg {
            WireMessage::CameraConnected(info) => {
                // Server push is authoritative for name/status; viewers
                // survive a re-announce.
                let camera = match self.registry.get_camera(&info.id).await {
                    Some(mut existing) => {
                        existing.display_name = info.name;
                        existing.status = info.status;
                        existing
                    }
                    None => CameraIdentity::from_wire(info),
                };
                self.registry.upsert_camera(camera).await;
                self.emit_camera_list().await;
            }

            WireMessage::CameraDisconnected { id } => {
                self.registry.remove_camera(&id).await;
                for session in self.registry.sessions_for_camera(&id).await {
                    self.fail_session(&session.session_id, "camera disconnected")
                        .await;
                }
                self.emit_camera_list().await;
            }

            WireMessage::ViewerJoined {
                camera_id,
                viewer_id,
            } => {
                self.registry
                    .update_camera(&camera_id, |c| c.add_viewer(viewer_id.clone()))
                    .await;
                self.emit_camera_list().await;

                let session_id = session_id_for(&camera_id, &viewer_id);
                if let Some(session) = self
                    .registry
                    .update_session(&session_id, |s| s.mark_connected())
                    .await
                {
                    // Viewer side: our join was confirmed
                    self.emit(CoordinatorEvent::SessionChanged(session));
                } else if self.is_local_camera(&camera_id) {
                    // Publisher side: a viewer we did not know about yet
                    self.begin_publisher_session(&camera_id, &viewer_id).await;
                }
            }

            WireMessage::ViewerLeft {
                camera_id,
                viewer_id,
            } => {
                self.registry
                    .update_camera(&camera_id, |c| c.remove_viewer(&viewer_id))
                    .await;
                self.emit_camera_list().await;

                let session_id = session_id_for(&camera_id, &viewer_id);
                self.fail_session(&session_id, "viewer left").await;
            }

            WireMessage::StreamStarted(conn) => {
                // Lifecycle ack; the membership message is what moves the
                // state machine, so this only confirms an in-flight join.
                if let Some(session) = self
                    .registry
                    .update_session(&conn.session_id, |s| s.mark_connected())
                    .await
                {
                    self.emit(CoordinatorEvent::SessionChanged(session));
                } else {
                    tracing::debug!(session = %conn.session_id, "Ack for unknown session");
                }
            }

            WireMessage::StreamStopped { session_id } => {
                // Server already knows; no leave message needed back
                self.end_session_internal(&session_id, SessionEndReason::Stopped, false)
                    .await;
            }

            WireMessage::WebrtcSignaling(signal) => {
                self.relay_signal(signal).await;
            }

            WireMessage::Event(data) => self.emit(CoordinatorEvent::ServerEvent(data)),
            WireMessage::Notification(data) => {
                self.emit(CoordinatorEvent::ServerNotification(data))
            }

            // Client → server vocabulary arriving inbound is a server bug;
            // tolerate it.
            other => {
                tracing::debug!(message = other.type_name(), "Ignoring unexpected inbound message");
            }
        }
    }

    async fn relay_signal(&self, signal: SignalingMessage) {
        self.signals_relayed.fetch_add(1, Ordering::Relaxed);

        // The pair ordering in from/to depends on the sender's role; the
        // session id is camera-first, so try both orientations.
        let forward = session_id_for(&signal.from, &signal.to);
        let reverse = session_id_for(&signal.to, &signal.from);
        let session_id = if self.registry.get_session(&forward).await.is_some() {
            forward
        } else if self.registry.get_session(&reverse).await.is_some() {
            reverse
        } else {
            forward
        };

        let payload = serde_json::to_value(&signal).unwrap_or(serde_json::Value::Null);
        self.media.relay_signal(&session_id, payload).await;
    }

    // ---- media events -----------------------------------------------------

    /// Feed one media backend event into the state machine.
    pub async fn handle_media_event(self: &Arc<Self>, event: MediaEvent) {
        match event {
            MediaEvent::MediaFlowing { session_id } => {
                if let Some(session) = self
                    .registry
                    .update_session(&session_id, |s| s.mark_streaming())
                    .await
                {
                    self.emit(CoordinatorEvent::SessionChanged(session));
                }
            }
            MediaEvent::RemoteMediaAvailable { session_id, handle } => {
                self.emit(CoordinatorEvent::RemoteMedia { session_id, handle });
            }
            MediaEvent::SessionEnded { session_id } => {
                // Normally follows our own end_session call, after the
                // record is already gone; a backend-initiated end fails
                // the session.
                if self.registry.get_session(&session_id).await.is_some() {
                    self.fail_session(&session_id, "media session ended").await;
                }
            }
        }
    }

    // ---- local operations -------------------------------------------------

    /// Register a publishable camera identity.
    ///
    /// Acquires local capture first — a camera that cannot capture has
    /// nothing to publish.
    pub async fn register_camera(self: &Arc<Self>, name: &str) -> Result<String> {
        if !self.is_connected() {
            return Err(IdentityError::NotConnected.into());
        }

        self.ensure_local_capture().await?;

        let id = generate_device_id(&self.config.id_prefix);
        self.registry
            .upsert_camera(CameraIdentity::new(&id, name, CameraStatus::Online))
            .await;
        self.local_cameras.lock().unwrap().insert(id.clone());

        self.send(WireMessage::RegisterCamera {
            id: id.clone(),
            name: name.to_string(),
            timestamp: unix_millis(),
        });

        tracing::info!(camera = %id, name = %name, "Camera registered");
        self.emit_camera_list().await;
        Ok(id)
    }

    /// Withdraw a camera identity and end every session on it.
    pub async fn unregister_camera(self: &Arc<Self>, camera_id: &str) {
        if !self.local_cameras.lock().unwrap().remove(camera_id) {
            tracing::debug!(camera = %camera_id, "Unregister for unknown local camera");
            return;
        }

        for session in self.registry.sessions_for_camera(camera_id).await {
            // The unregister message itself tells the server
            self.end_session_internal(&session.session_id, SessionEndReason::Stopped, false)
                .await;
        }

        self.registry.remove_camera(camera_id).await;
        self.send(WireMessage::UnregisterCamera {
            id: camera_id.to_string(),
        });

        tracing::info!(camera = %camera_id, "Camera unregistered");
        self.emit_camera_list().await;
    }

    /// Publisher goes live: announce the stream.
    pub async fn start_publishing(self: &Arc<Self>, camera_id: &str) -> Result<()> {
        if !self.is_connected() {
            return Err(IdentityError::NotConnected.into());
        }
        if !self.is_local_camera(camera_id) {
            return Err(IdentityError::CameraNotFound(camera_id.to_string()).into());
        }

        self.registry
            .update_camera(camera_id, |c| c.status = CameraStatus::Streaming)
            .await;
        self.send(WireMessage::StartStream {
            camera_id: camera_id.to_string(),
            timestamp: unix_millis(),
        });

        tracing::info!(camera = %camera_id, "Publishing started");
        self.emit_camera_list().await;
        Ok(())
    }

    /// Publisher stops: end every viewer session on the camera.
    /// Idempotent — stopping an unknown or idle camera is a no-op.
    pub async fn stop_publishing(self: &Arc<Self>, camera_id: &str) {
        let sessions = self.registry.sessions_for_camera(camera_id).await;
        for session in sessions {
            self.media.end_session(&session.session_id).await;
            self.registry.remove_session(&session.session_id).await;
            self.emit(CoordinatorEvent::SessionEnded {
                session_id: session.session_id,
                camera_id: session.camera_id,
                viewer_id: session.viewer_id,
                reason: SessionEndReason::Stopped,
            });
        }

        if self
            .registry
            .update_camera(camera_id, |c| c.status = CameraStatus::Online)
            .await
            .is_some()
        {
            self.send(WireMessage::StopStream {
                camera_id: camera_id.to_string(),
                viewer_id: None,
            });
            tracing::info!(camera = %camera_id, "Publishing stopped");
            self.emit_camera_list().await;
        }
    }

    /// Viewer joins a camera's stream.
    ///
    /// Idempotent per pairing: a join for an already-active session
    /// returns the existing record unchanged.
    pub async fn start_watching(
        self: &Arc<Self>,
        camera_id: &str,
        viewer_id: &str,
    ) -> Result<Session> {
        if !self.is_connected() {
            return Err(IdentityError::NotConnected.into());
        }
        if self.registry.get_camera(camera_id).await.is_none() {
            return Err(IdentityError::CameraNotFound(camera_id.to_string()).into());
        }

        let session_id = session_id_for(camera_id, viewer_id);
        if let Some(existing) = self.registry.get_session(&session_id).await {
            if existing.is_active() {
                tracing::debug!(session = %session_id, "Join for active session; reusing");
                return Ok(existing);
            }
        }

        let session = Session::new(camera_id, viewer_id);
        self.registry.upsert_session(session.clone()).await;
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
        self.emit(CoordinatorEvent::SessionChanged(session.clone()));

        self.send(WireMessage::JoinStream {
            camera_id: camera_id.to_string(),
            viewer_id: viewer_id.to_string(),
            timestamp: unix_millis(),
        });

        self.spawn_subscribe(&session_id);
        tracing::info!(session = %session_id, "Watch session created");
        Ok(session)
    }

    /// Stop one session. Idempotent — unknown ids are a no-op.
    pub async fn stop_session(self: &Arc<Self>, session_id: &str) {
        if self.registry.get_session(session_id).await.is_none() {
            tracing::debug!(session = %session_id, "Stop for unknown session; ignoring");
            return;
        }
        self.end_session_internal(session_id, SessionEndReason::Stopped, true)
            .await;
    }

    // ---- internals --------------------------------------------------------

    fn is_local_camera(&self, camera_id: &str) -> bool {
        self.local_cameras.lock().unwrap().contains(camera_id)
    }

    async fn ensure_local_capture(self: &Arc<Self>) -> Result<MediaHandle> {
        let mut capture = self.local_capture.lock().await;
        if let Some(handle) = capture.as_ref() {
            return Ok(handle.clone());
        }

        let handle = self
            .media
            .initialize_local_capture()
            .await
            .map_err(Error::Media)?;
        *capture = Some(handle.clone());
        Ok(handle)
    }

    /// Publisher side of `viewer_joined`: materialize the session and
    /// start publish negotiation for that one viewer.
    async fn begin_publisher_session(self: &Arc<Self>, camera_id: &str, viewer_id: &str) {
        let mut session = Session::new(camera_id, viewer_id);
        session.mark_connected();
        let session_id = session.session_id.clone();

        self.registry.upsert_session(session.clone()).await;
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
        self.emit(CoordinatorEvent::SessionChanged(session));

        let local = match self.ensure_local_capture().await {
            Ok(handle) => handle,
            Err(e) => {
                self.fail_session(&session_id, e.to_string()).await;
                return;
            }
        };

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let result = this.media.begin_publish(&session_id, &local).await;
            this.settle_negotiation(&session_id, result).await;
        });
    }

    /// Viewer side: run subscribe negotiation off the message-handling
    /// path.
    fn spawn_subscribe(self: &Arc<Self>, session_id: &str) {
        let session_id = session_id.to_string();
        let this = Arc::clone(self);

        tokio::spawn(async move {
            let result = this.media.begin_subscribe(&session_id).await;
            this.settle_negotiation(&session_id, result).await;
        });
    }

    /// Apply the outcome of a settled negotiation. A session stopped
    /// while the call was outstanding still gets its media resources
    /// released — never abandoned.
    async fn settle_negotiation(
        self: &Arc<Self>,
        session_id: &str,
        result: std::result::Result<(), crate::error::MediaError>,
    ) {
        match result {
            Ok(()) => {
                if self.registry.get_session(session_id).await.is_none() {
                    tracing::debug!(
                        session = %session_id,
                        "Session stopped during negotiation; releasing media"
                    );
                    self.media.end_session(session_id).await;
                }
            }
            Err(e) => self.fail_session(session_id, e.to_string()).await,
        }
    }

    /// Error-terminate one session: notify, release media, drop the record.
    async fn fail_session(self: &Arc<Self>, session_id: &str, reason: impl Into<String>) {
        let reason = reason.into();
        let Some(mut session) = self.registry.remove_session(session_id).await else {
            return;
        };

        session.fail(reason.clone());
        self.sessions_failed.fetch_add(1, Ordering::Relaxed);
        self.media.end_session(session_id).await;

        tracing::warn!(session = %session_id, reason = %reason, "Session failed");
        self.emit(CoordinatorEvent::SessionEnded {
            session_id: session.session_id,
            camera_id: session.camera_id,
            viewer_id: session.viewer_id,
            reason: SessionEndReason::Failed(reason),
        });
    }

    /// Cleanly terminate one session (explicit stop or server ack).
    async fn end_session_internal(
        self: &Arc<Self>,
        session_id: &str,
        reason: SessionEndReason,
        send_leave: bool,
    ) {
        let Some(mut session) = self.registry.remove_session(session_id).await else {
            return;
        };
        session.mark_stopped();

        self.media.end_session(session_id).await;
        if send_leave {
            self.send(WireMessage::LeaveStream {
                camera_id: session.camera_id.clone(),
                viewer_id: session.viewer_id.clone(),
            });
        }

        tracing::info!(session = %session_id, "Session stopped");
        self.emit(CoordinatorEvent::SessionEnded {
            session_id: session.session_id,
            camera_id: session.camera_id,
            viewer_id: session.viewer_id,
            reason,
        });
    }

    fn send(&self, msg: WireMessage) {
        if self.outbound.try_send(msg).is_err() {
            tracing::debug!("Outbound queue unavailable; message dropped");
        }
    }

    async fn emit_camera_list(&self) {
        let cameras = self.registry.list_cameras().await;
        self.emit(CoordinatorEvent::CameraListChanged(cameras));
    }

    fn emit(&self, event: CoordinatorEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::media::{SimulatedMedia, SimulatedMediaConfig};
    use crate::protocol::CameraInfo;
    use crate::registry::SessionState;

    struct Harness {
        coordinator: Arc<SessionCoordinator>,
        media: Arc<SimulatedMedia>,
        wire_rx: mpsc::Receiver<WireMessage>,
    }

    fn harness_with(media_config: SimulatedMediaConfig) -> Harness {
        let registry = Arc::new(SessionRegistry::new());
        let media = Arc::new(SimulatedMedia::with_config(media_config));
        let (wire_tx, wire_rx) = mpsc::channel(32);

        let coordinator = SessionCoordinator::new(
            CoordinatorConfig::default(),
            registry,
            Arc::clone(&media) as Arc<dyn MediaAdapter>,
            wire_tx,
        );

        Harness {
            coordinator,
            media,
            wire_rx,
        }
    }

    fn harness() -> Harness {
        harness_with(SimulatedMediaConfig {
            negotiation_delay: Duration::from_millis(10),
            ..Default::default()
        })
    }

    async fn open(h: &Harness) {
        h.coordinator
            .handle_transport_event(TransportEvent::Opened)
            .await;
    }

    async fn push_camera(h: &Harness, id: &str) {
        h.coordinator
            .handle_transport_event(TransportEvent::Message(WireMessage::CameraConnected(
                CameraInfo {
                    id: id.into(),
                    name: "Test camera".into(),
                    status: crate::protocol::CameraStatus::Online,
                },
            )))
            .await;
    }

    /// Pump simulated media events into the coordinator until the session
    /// reaches the wanted state or the deadline passes. The receiver must
    /// have been subscribed before negotiation started.
    async fn pump_until_state(
        h: &mut Harness,
        media_events: &mut broadcast::Receiver<MediaEvent>,
        session_id: &str,
        wanted: SessionState,
    ) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);

        loop {
            if let Some(session) = h.coordinator.registry().get_session(session_id).await {
                if session.state == wanted {
                    return;
                }
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "session {} never reached {:?}",
                session_id,
                wanted
            );

            if let Ok(Ok(event)) =
                tokio::time::timeout(Duration::from_millis(100), media_events.recv()).await
            {
                h.coordinator.handle_media_event(event).await;
            }
        }
    }

    async fn expect_wire(h: &mut Harness, type_name: &str) -> WireMessage {
        let msg = tokio::time::timeout(Duration::from_secs(2), h.wire_rx.recv())
            .await
            .expect("timed out waiting for wire message")
            .expect("wire channel closed");
        assert_eq!(msg.type_name(), type_name);
        msg
    }

    #[tokio::test]
    async fn test_register_requires_connection() {
        let h = harness();

        let result = h.coordinator.register_camera("Front door").await;
        assert!(matches!(
            result,
            Err(Error::Identity(IdentityError::NotConnected))
        ));
    }

    #[tokio::test]
    async fn test_register_camera() {
        let mut h = harness();
        open(&h).await;

        let id = h.coordinator.register_camera("Front door").await.unwrap();
        assert!(id.starts_with("cam_"));

        match expect_wire(&mut h, "register_camera").await {
            WireMessage::RegisterCamera { id: wire_id, name, .. } => {
                assert_eq!(wire_id, id);
                assert_eq!(name, "Front door");
            }
            _ => unreachable!(),
        }

        let camera = h.coordinator.registry().get_camera(&id).await.unwrap();
        assert_eq!(camera.status, CameraStatus::Online);
    }

    #[tokio::test]
    async fn test_capture_failure_blocks_registration() {
        let h = harness_with(SimulatedMediaConfig {
            fail_capture: true,
            ..Default::default()
        });
        open(&h).await;

        let result = h.coordinator.register_camera("Broken").await;
        assert!(matches!(result, Err(Error::Media(_))));
        assert!(h.coordinator.registry().list_cameras().await.is_empty());
    }

    #[tokio::test]
    async fn test_join_is_idempotent_per_pairing() {
        let h = harness_with(SimulatedMediaConfig {
            negotiation_delay: Duration::from_millis(500),
            ..Default::default()
        });
        open(&h).await;
        push_camera(&h, "MIMO_1000_abc").await;

        let first = h
            .coordinator
            .start_watching("MIMO_1000_abc", "viewer_1")
            .await
            .unwrap();
        let second = h
            .coordinator
            .start_watching("MIMO_1000_abc", "viewer_1")
            .await
            .unwrap();

        assert_eq!(first.session_id, second.session_id);
        assert_eq!(second.state, first.state);
        assert_eq!(h.coordinator.registry().list_sessions().await.len(), 1);
        assert_eq!(h.coordinator.stats().sessions_created, 1);
    }

    #[tokio::test]
    async fn test_watch_unknown_camera() {
        let h = harness();
        open(&h).await;

        let result = h.coordinator.start_watching("ghost", "viewer_1").await;
        assert!(matches!(
            result,
            Err(Error::Identity(IdentityError::CameraNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_end_to_end_viewer_flow() {
        let mut h = harness();
        open(&h).await;
        push_camera(&h, "MIMO_1000_abc").await;
        let mut media_events = h.media.events();

        // Join: session created in Connecting, join_stream sent
        let session = h
            .coordinator
            .start_watching("MIMO_1000_abc", "viewer_1")
            .await
            .unwrap();
        assert_eq!(session.state, SessionState::Connecting);
        expect_wire(&mut h, "join_stream").await;

        // Server confirms membership: Connecting → Connected
        h.coordinator
            .handle_transport_event(TransportEvent::Message(WireMessage::ViewerJoined {
                camera_id: "MIMO_1000_abc".into(),
                viewer_id: "viewer_1".into(),
            }))
            .await;
        let current = h
            .coordinator
            .registry()
            .get_session(&session.session_id)
            .await
            .unwrap();
        assert_eq!(current.state, SessionState::Connected);

        // Media flows: Connected → Streaming
        let session_id = session.session_id.clone();
        pump_until_state(&mut h, &mut media_events, &session_id, SessionState::Streaming).await;

        // Teardown: leave_stream sent, session removed
        h.coordinator.stop_session(&session.session_id).await;
        expect_wire(&mut h, "leave_stream").await;
        assert!(h
            .coordinator
            .registry()
            .get_session(&session.session_id)
            .await
            .is_none());

        // Server propagates the membership change
        h.coordinator
            .handle_transport_event(TransportEvent::Message(WireMessage::ViewerLeft {
                camera_id: "MIMO_1000_abc".into(),
                viewer_id: "viewer_1".into(),
            }))
            .await;
        let camera = h
            .coordinator
            .registry()
            .get_camera("MIMO_1000_abc")
            .await
            .unwrap();
        assert!(!camera.viewers.contains("viewer_1"));
    }

    #[tokio::test]
    async fn test_viewer_left_spares_sibling_sessions() {
        let h = harness_with(SimulatedMediaConfig {
            negotiation_delay: Duration::from_millis(500),
            ..Default::default()
        });
        open(&h).await;
        push_camera(&h, "cam_a").await;

        h.coordinator.start_watching("cam_a", "v1").await.unwrap();
        h.coordinator.start_watching("cam_a", "v2").await.unwrap();

        h.coordinator
            .handle_transport_event(TransportEvent::Message(WireMessage::ViewerLeft {
                camera_id: "cam_a".into(),
                viewer_id: "v1".into(),
            }))
            .await;

        assert!(h.coordinator.registry().get_session("cam_a_v1").await.is_none());
        let sibling = h.coordinator.registry().get_session("cam_a_v2").await.unwrap();
        assert!(sibling.is_active());
    }

    #[tokio::test]
    async fn test_camera_disconnect_fails_its_sessions() {
        let h = harness_with(SimulatedMediaConfig {
            negotiation_delay: Duration::from_millis(500),
            ..Default::default()
        });
        open(&h).await;
        push_camera(&h, "cam_a").await;
        push_camera(&h, "cam_b").await;

        h.coordinator.start_watching("cam_a", "v1").await.unwrap();
        h.coordinator.start_watching("cam_b", "v1").await.unwrap();

        let mut events = h.coordinator.subscribe();
        h.coordinator
            .handle_transport_event(TransportEvent::Message(WireMessage::CameraDisconnected {
                id: "cam_a".into(),
            }))
            .await;

        assert!(h.coordinator.registry().get_camera("cam_a").await.is_none());
        assert!(h.coordinator.registry().get_session("cam_a_v1").await.is_none());
        assert!(h.coordinator.registry().get_session("cam_b_v1").await.is_some());

        // The failure was reported to the session owner
        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if let CoordinatorEvent::SessionEnded {
                session_id,
                reason: SessionEndReason::Failed(_),
                ..
            } = event
            {
                assert_eq!(session_id, "cam_a_v1");
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test]
    async fn test_transport_close_clears_everything() {
        let h = harness();
        open(&h).await;
        push_camera(&h, "cam_a").await;
        h.coordinator.start_watching("cam_a", "v1").await.unwrap();

        h.coordinator
            .handle_transport_event(TransportEvent::Closed {
                code: 1006,
                reason: "connection reset".into(),
            })
            .await;

        assert!(!h.coordinator.is_connected());
        assert!(h.coordinator.registry().list_cameras().await.is_empty());
        assert!(h.coordinator.registry().list_sessions().await.is_empty());

        // The in-flight negotiation settles against an empty registry and
        // releases its media resources
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while h.media.session_count() != 0 {
            assert!(tokio::time::Instant::now() < deadline, "media never released");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_negotiation_failure_fails_session() {
        let h = harness_with(SimulatedMediaConfig {
            negotiation_delay: Duration::from_millis(10),
            fail_negotiation: true,
            ..Default::default()
        });
        open(&h).await;
        push_camera(&h, "cam_a").await;

        h.coordinator.start_watching("cam_a", "v1").await.unwrap();

        // The spawned negotiation settles and removes the record
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while h.coordinator.registry().get_session("cam_a_v1").await.is_some() {
            assert!(tokio::time::Instant::now() < deadline, "session never failed");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(h.coordinator.stats().sessions_failed, 1);
    }

    #[tokio::test]
    async fn test_stop_during_negotiation_releases_media() {
        let h = harness_with(SimulatedMediaConfig {
            negotiation_delay: Duration::from_millis(200),
            ..Default::default()
        });
        open(&h).await;
        push_camera(&h, "cam_a").await;

        h.coordinator.start_watching("cam_a", "v1").await.unwrap();
        h.coordinator.stop_session("cam_a_v1").await;

        // Once the outstanding negotiation settles, the media resources
        // for the stopped session must be gone.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(h.media.session_count(), 0);
        assert!(h.coordinator.registry().get_session("cam_a_v1").await.is_none());
    }

    #[tokio::test]
    async fn test_stop_unknown_session_is_noop() {
        let h = harness();
        open(&h).await;

        // Must not panic, must not send anything
        h.coordinator.stop_session("never_existed").await;
        assert!(h.coordinator.registry().list_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_publisher_session_on_viewer_joined() {
        let mut h = harness();
        open(&h).await;

        let camera_id = h.coordinator.register_camera("Front door").await.unwrap();
        expect_wire(&mut h, "register_camera").await;
        h.coordinator.start_publishing(&camera_id).await.unwrap();
        expect_wire(&mut h, "start_stream").await;

        let mut media_events = h.media.events();
        h.coordinator
            .handle_transport_event(TransportEvent::Message(WireMessage::ViewerJoined {
                camera_id: camera_id.clone(),
                viewer_id: "viewer_9".into(),
            }))
            .await;

        let session_id = session_id_for(&camera_id, "viewer_9");
        let session = h.coordinator.registry().get_session(&session_id).await.unwrap();
        assert_eq!(session.state, SessionState::Connected);

        let camera = h.coordinator.registry().get_camera(&camera_id).await.unwrap();
        assert!(camera.viewers.contains("viewer_9"));
        assert!(camera.is_streaming());

        // Publish negotiation completes and media starts flowing
        pump_until_state(&mut h, &mut media_events, &session_id, SessionState::Streaming).await;
    }

    #[tokio::test]
    async fn test_stop_publishing_idempotent() {
        let h = harness();
        open(&h).await;

        // Unknown camera: nothing happens, nothing panics
        h.coordinator.stop_publishing("ghost").await;
        assert_eq!(h.coordinator.registry().active_session_count().await, 0);
    }

    #[tokio::test]
    async fn test_signal_relay_is_opaque_and_tolerant() {
        let h = harness();
        open(&h).await;

        // No session anywhere: the backend logs and carries on
        h.coordinator
            .handle_transport_event(TransportEvent::Message(WireMessage::WebrtcSignaling(
                SignalingMessage {
                    kind: crate::protocol::SignalKind::Offer,
                    from: "cam_x".into(),
                    to: "viewer_y".into(),
                    payload: serde_json::json!({"sdp": "v=0..."}),
                },
            )))
            .await;

        assert_eq!(h.coordinator.stats().signals_relayed, 1);
    }

    #[tokio::test]
    async fn test_multiplexed_frames_reemitted() {
        let h = harness();
        open(&h).await;
        let mut events = h.coordinator.subscribe();

        h.coordinator
            .handle_transport_event(TransportEvent::Message(WireMessage::Event(
                serde_json::json!({"kind": "motion"}),
            )))
            .await;

        let mut saw_event = false;
        while let Ok(event) = events.try_recv() {
            if let CoordinatorEvent::ServerEvent(data) = event {
                assert_eq!(data["kind"], "motion");
                saw_event = true;
            }
        }
        assert!(saw_event);
    }
}
