//! Client context
//!
//! One long-lived object wires the pieces together: the signaling socket,
//! the registry, the media backend, and the coordinator, plus the pump
//! tasks that move events between them. Everything is constructed once at
//! application start and injected — there is no global state anywhere in
//! the crate.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::coordinator::{
    CoordinatorConfig, CoordinatorEvent, SessionCoordinator,
};
use crate::media::MediaAdapter;
use crate::registry::SessionRegistry;
use crate::transport::{SignalSocket, TransportConfig};

use super::publisher::PublisherSession;
use super::viewer::ViewerSession;

/// Client options
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Signaling socket options
    pub transport: TransportConfig,

    /// Coordinator options
    pub coordinator: CoordinatorConfig,
}

impl ClientConfig {
    /// Config pointing at the given server URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            transport: TransportConfig::with_url(url),
            ..Default::default()
        }
    }
}

/// The assembled coordination client
pub struct CamlinkClient {
    socket: SignalSocket,
    coordinator: Arc<SessionCoordinator>,
    media: Arc<dyn MediaAdapter>,
    pumps: Vec<JoinHandle<()>>,
}

impl CamlinkClient {
    /// Assemble a client around the injected media backend.
    pub fn new(config: ClientConfig, media: Arc<dyn MediaAdapter>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let socket = SignalSocket::new(config.transport);
        let (wire_tx, mut wire_rx) = mpsc::channel(64);

        let coordinator = SessionCoordinator::new(
            config.coordinator,
            registry,
            Arc::clone(&media),
            wire_tx,
        );

        let mut pumps = Vec::with_capacity(3);

        // Outbound: coordinator → socket
        {
            let socket = socket.clone();
            pumps.push(tokio::spawn(async move {
                while let Some(msg) = wire_rx.recv().await {
                    socket.send(&msg);
                }
            }));
        }

        // Inbound: socket events → coordinator, in receipt order
        {
            let mut events = socket.subscribe();
            let coordinator = Arc::clone(&coordinator);
            pumps.push(tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(event) => coordinator.handle_transport_event(event).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped = skipped, "Transport events lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }));
        }

        // Media backend events → coordinator
        {
            let mut events = media.events();
            let coordinator = Arc::clone(&coordinator);
            pumps.push(tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(event) => coordinator.handle_media_event(event).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped = skipped, "Media events lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }));
        }

        Self {
            socket,
            coordinator,
            media,
            pumps,
        }
    }

    /// Connect the signaling socket. See [`SignalSocket::connect`].
    pub async fn connect(&self) -> bool {
        self.socket.connect().await
    }

    /// Manually reconnect, resetting the retry counter.
    pub async fn reconnect(&self) -> bool {
        self.socket.reconnect().await
    }

    /// Whether the coordination layer currently sees a live transport.
    pub fn is_connected(&self) -> bool {
        self.coordinator.is_connected()
    }

    /// Subscribe to coordinator events.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.coordinator.subscribe()
    }

    /// The signaling socket handle.
    pub fn socket(&self) -> &SignalSocket {
        &self.socket
    }

    /// The coordinator handle.
    pub fn coordinator(&self) -> &Arc<SessionCoordinator> {
        &self.coordinator
    }

    /// Create a camera-side role manager.
    pub fn publisher(&self) -> PublisherSession {
        PublisherSession::new(Arc::clone(&self.coordinator))
    }

    /// Create a viewer-side role manager.
    pub fn viewer(&self) -> ViewerSession {
        ViewerSession::new(Arc::clone(&self.coordinator))
    }

    /// Tear everything down: close the socket, reset coordination state,
    /// release media resources, stop the pumps.
    pub async fn shutdown(&self) {
        self.socket.close().await;
        self.coordinator
            .handle_transport_event(crate::transport::TransportEvent::Closed {
                code: 1000,
                reason: "shutdown".into(),
            })
            .await;
        self.media.cleanup_all().await;

        for pump in &self.pumps {
            pump.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::StreamExt;
    use tokio_tungstenite::tungstenite::Message;

    use super::*;
    use crate::media::SimulatedMedia;

    /// Local signaling server that records the text frames it receives.
    async fn spawn_server() -> (std::net::SocketAddr, mpsc::Receiver<String>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                    while let Some(Ok(msg)) = ws.next().await {
                        if let Message::Text(text) = msg {
                            let _ = tx.send(text).await;
                        }
                    }
                });
            }
        });

        (addr, rx)
    }

    #[tokio::test]
    async fn test_wired_register_reaches_server() {
        let (addr, mut server_rx) = spawn_server().await;

        let client = CamlinkClient::new(
            ClientConfig::with_url(format!("ws://{}/ws", addr)),
            Arc::new(SimulatedMedia::new()),
        );

        assert!(client.connect().await);

        // The Opened event flows through the pump before the coordinator
        // reports connected
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while !client.is_connected() {
            assert!(tokio::time::Instant::now() < deadline, "never connected");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let publisher = client.publisher();
        let camera_id = publisher.register_identity("Front door").await.unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(2), server_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(frame.contains("register_camera"));
        assert!(frame.contains(&camera_id));

        client.shutdown().await;
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_shutdown_without_connect() {
        let client = CamlinkClient::new(
            ClientConfig::default(),
            Arc::new(SimulatedMedia::new()),
        );

        // Must not hang or panic
        client.shutdown().await;
        assert!(!client.is_connected());
    }
}
