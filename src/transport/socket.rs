//! Signaling socket
//!
//! One persistent WebSocket to the coordination server, shared by the
//! streaming coordinator and unrelated concerns (events, notifications).
//! The socket owns the reconnect-with-backoff discipline: an unexpected
//! close or a socket error schedules a retry after an exponentially
//! growing, jittered delay, up to a retry ceiling. An explicit `close()`
//! cancels any pending retry.
//!
//! Send is fire-and-forget: frames sent while the socket is not open are
//! dropped with a log line, never queued across reconnects.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::protocol::WireMessage;
use crate::stats::TransportStats;

use super::backoff;
use super::config::TransportConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket close code reported when the peer vanished without a close frame
const ABNORMAL_CLOSURE: u16 = 1006;

/// Socket connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Never connected
    Idle,
    /// Connection attempt in flight
    Connecting,
    /// Socket open, frames flowing
    Open,
    /// Closed (explicitly or by the peer)
    Closed,
}

/// Snapshot of the transport connection state
#[derive(Debug, Clone)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

/// Events emitted by the signaling socket
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Socket opened successfully
    Opened,
    /// Socket closed (close code and reason, when the peer supplied them)
    Closed { code: u16, reason: String },
    /// A decoded signaling message arrived
    Message(WireMessage),
    /// A binary frame arrived
    Binary(Bytes),
    /// A socket-level error occurred (the close path follows)
    Error(String),
}

struct Shared {
    config: TransportConfig,
    status: Mutex<ConnectionStatus>,
    retry_count: AtomicU32,
    auto_reconnect: AtomicBool,
    last_error: Mutex<Option<String>>,
    events: broadcast::Sender<TransportEvent>,
    outbound: Mutex<Option<mpsc::Sender<Message>>>,
    retry_timer: Mutex<Option<JoinHandle<()>>>,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    reconnect_attempts: AtomicU64,
}

/// Persistent signaling socket
///
/// Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct SignalSocket {
    shared: Arc<Shared>,
}

impl SignalSocket {
    /// Create a socket for the given configuration. No connection is made
    /// until `connect()` is called.
    pub fn new(config: TransportConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);

        Self {
            shared: Arc::new(Shared {
                config,
                status: Mutex::new(ConnectionStatus::Idle),
                retry_count: AtomicU32::new(0),
                auto_reconnect: AtomicBool::new(false),
                last_error: Mutex::new(None),
                events,
                outbound: Mutex::new(None),
                retry_timer: Mutex::new(None),
                messages_sent: AtomicU64::new(0),
                messages_received: AtomicU64::new(0),
                reconnect_attempts: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe to transport events.
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.shared.events.subscribe()
    }

    /// Snapshot of the current connection state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState {
            status: *self.shared.status.lock().unwrap(),
            retry_count: self.shared.retry_count.load(Ordering::Relaxed),
            last_error: self.shared.last_error.lock().unwrap().clone(),
        }
    }

    /// Whether the socket is currently open.
    pub fn is_open(&self) -> bool {
        *self.shared.status.lock().unwrap() == ConnectionStatus::Open
    }

    /// Transport counters snapshot.
    pub fn stats(&self) -> TransportStats {
        TransportStats {
            messages_sent: self.shared.messages_sent.load(Ordering::Relaxed),
            messages_received: self.shared.messages_received.load(Ordering::Relaxed),
            reconnect_attempts: self.shared.reconnect_attempts.load(Ordering::Relaxed),
        }
    }

    /// Open the connection.
    ///
    /// Returns `true` on a successful open. Returns `false` immediately if
    /// an attempt is already in flight or the socket is already open, and
    /// `false` after a failed attempt (the failure also goes through the
    /// standard backoff path).
    pub async fn connect(&self) -> bool {
        Shared::connect(Arc::clone(&self.shared)).await
    }

    /// Reset error state and retry counter, then connect.
    ///
    /// No-op returning `false` while an attempt is already in progress.
    pub async fn reconnect(&self) -> bool {
        {
            let status = self.shared.status.lock().unwrap();
            if matches!(
                *status,
                ConnectionStatus::Connecting | ConnectionStatus::Open
            ) {
                return false;
            }
        }

        self.shared.retry_count.store(0, Ordering::Relaxed);
        *self.shared.last_error.lock().unwrap() = None;
        self.connect().await
    }

    /// Send a signaling message.
    ///
    /// Drops the message with a debug log when the socket is not open.
    /// Never errors, never queues across reconnects.
    pub fn send(&self, msg: &WireMessage) {
        let outbound = self.shared.outbound.lock().unwrap().clone();
        let Some(tx) = outbound else {
            tracing::debug!(message = msg.type_name(), "Dropping message: socket not open");
            return;
        };

        match msg.encode() {
            Ok(text) => {
                if tx.try_send(Message::Text(text)).is_ok() {
                    self.shared.messages_sent.fetch_add(1, Ordering::Relaxed);
                } else {
                    tracing::debug!(
                        message = msg.type_name(),
                        "Dropping message: send queue unavailable"
                    );
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to encode wire message"),
        }
    }

    /// Close the socket and cancel any pending reconnect. Idempotent.
    pub async fn close(&self) {
        self.shared.auto_reconnect.store(false, Ordering::Relaxed);

        if let Some(timer) = self.shared.retry_timer.lock().unwrap().take() {
            timer.abort();
        }

        *self.shared.status.lock().unwrap() = ConnectionStatus::Closed;

        // Dropping the sender ends the write loop, which sends the close
        // frame and shuts the sink down.
        self.shared.outbound.lock().unwrap().take();
    }
}

impl Shared {
    /// Boxed connect, so the retry task can re-enter without an infinitely
    /// sized future type.
    fn connect_boxed(self: Arc<Self>) -> BoxFuture<'static, bool> {
        Box::pin(Self::connect(self))
    }

    async fn connect(self: Arc<Self>) -> bool {
        {
            let mut status = self.status.lock().unwrap();
            match *status {
                ConnectionStatus::Connecting | ConnectionStatus::Open => {
                    tracing::debug!("Connect ignored: attempt already in flight");
                    return false;
                }
                _ => *status = ConnectionStatus::Connecting,
            }
        }
        self.auto_reconnect.store(true, Ordering::Relaxed);

        let attempt = tokio::time::timeout(
            self.config.connect_timeout,
            connect_async(self.config.url.as_str()),
        )
        .await;

        let ws = match attempt {
            Ok(Ok((ws, _response))) => ws,
            Ok(Err(e)) => {
                self.connect_failed(e.to_string());
                return false;
            }
            Err(_) => {
                self.connect_failed("connect timed out".into());
                return false;
            }
        };

        // close() may have raced the handshake
        if !self.auto_reconnect.load(Ordering::Relaxed) {
            tracing::debug!("Socket closed during connect; dropping fresh connection");
            *self.status.lock().unwrap() = ConnectionStatus::Closed;
            return false;
        }

        self.retry_count.store(0, Ordering::Relaxed);
        *self.last_error.lock().unwrap() = None;
        *self.status.lock().unwrap() = ConnectionStatus::Open;

        let (tx, rx) = mpsc::channel(self.config.send_queue_size);
        *self.outbound.lock().unwrap() = Some(tx);

        let (sink, stream) = ws.split();
        tokio::spawn(Self::write_loop(sink, rx));
        tokio::spawn(Self::read_loop(Arc::clone(&self), stream));

        tracing::info!(url = %self.config.url, "Signaling socket open");
        self.emit(TransportEvent::Opened);
        true
    }

    fn connect_failed(self: &Arc<Self>, reason: String) {
        tracing::warn!(error = %reason, "Signaling connect failed");
        *self.status.lock().unwrap() = ConnectionStatus::Closed;
        *self.last_error.lock().unwrap() = Some(reason.clone());
        self.emit(TransportEvent::Error(reason));
        self.schedule_retry();
    }

    async fn write_loop(mut sink: SplitSink<WsStream, Message>, mut rx: mpsc::Receiver<Message>) {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = sink.send(frame).await {
                tracing::debug!(error = %e, "Socket write failed");
                break;
            }
        }
        let _ = sink.close().await;
    }

    async fn read_loop(self: Arc<Self>, mut stream: SplitStream<WsStream>) {
        let mut close_code = ABNORMAL_CLOSURE;
        let mut close_reason = String::new();

        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => match WireMessage::decode(&text) {
                    Ok(msg) => {
                        self.messages_received.fetch_add(1, Ordering::Relaxed);
                        self.emit(TransportEvent::Message(msg));
                    }
                    Err(e) => {
                        // The socket carries frames for other subsystems;
                        // anything outside the vocabulary is skipped.
                        tracing::debug!(error = %e, "Skipping unrecognized frame");
                    }
                },
                Ok(Message::Binary(data)) => {
                    self.emit(TransportEvent::Binary(Bytes::from(data)));
                }
                Ok(Message::Close(frame)) => {
                    if let Some(frame) = frame {
                        close_code = u16::from(frame.code);
                        close_reason = frame.reason.into_owned();
                    } else {
                        close_code = 1000;
                    }
                    break;
                }
                Ok(_) => {} // ping/pong handled by the protocol layer
                Err(e) => {
                    close_reason = e.to_string();
                    self.emit(TransportEvent::Error(close_reason.clone()));
                    break;
                }
            }
        }

        self.disconnected(close_code, close_reason);
    }

    fn disconnected(self: &Arc<Self>, code: u16, reason: String) {
        let was_live = {
            let mut status = self.status.lock().unwrap();
            let was_live = matches!(
                *status,
                ConnectionStatus::Open | ConnectionStatus::Connecting
            );
            *status = ConnectionStatus::Closed;
            was_live
        };
        self.outbound.lock().unwrap().take();

        if !reason.is_empty() {
            *self.last_error.lock().unwrap() = Some(reason.clone());
        }

        tracing::info!(code = code, reason = %reason, "Signaling socket closed");
        self.emit(TransportEvent::Closed { code, reason });

        // Only an unexpected close reaches here with a live status; an
        // explicit close() has already flipped it and disabled retries.
        if was_live {
            self.schedule_retry();
        }
    }

    fn schedule_retry(self: &Arc<Self>) {
        if !self.auto_reconnect.load(Ordering::Relaxed) {
            return;
        }

        let retry = self.retry_count.load(Ordering::Relaxed);
        if retry >= self.config.max_retries {
            tracing::warn!(
                retries = retry,
                "Reconnect ceiling reached; stopping automatic retries"
            );
            return;
        }

        let delay = backoff::next_delay(
            retry,
            self.config.base_delay,
            self.config.max_delay,
            self.config.jitter_max,
        );
        self.retry_count.store(retry + 1, Ordering::Relaxed);
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            retry = retry + 1,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );

        let shared = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.connect_boxed().await;
        });

        if let Some(previous) = self.retry_timer.lock().unwrap().replace(handle) {
            previous.abort();
        }
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use super::*;

    /// Minimal ws server: forwards received text frames to the returned
    /// channel, holds connections open until the client goes away.
    async fn spawn_server() -> (SocketAddr, mpsc::Receiver<String>) {
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

    fn test_config(addr: SocketAddr) -> TransportConfig {
        TransportConfig::with_url(format!("ws://{}/ws", addr))
            .base_delay(Duration::from_millis(50))
            .jitter_max(Duration::ZERO)
            .connect_timeout(Duration::from_secs(2))
    }

    async fn next_event(rx: &mut broadcast::Receiver<TransportEvent>) -> TransportEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for transport event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_connect_send_and_duplicate_connect() {
        let (addr, mut server_rx) = spawn_server().await;
        let socket = SignalSocket::new(test_config(addr));
        let mut events = socket.subscribe();

        assert!(socket.connect().await);
        assert!(matches!(next_event(&mut events).await, TransportEvent::Opened));
        assert!(socket.is_open());

        // Second connect while open is a no-op
        assert!(!socket.connect().await);

        socket.send(&WireMessage::UnregisterCamera { id: "cam_1".into() });

        let received = tokio::time::timeout(Duration::from_secs(5), server_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(received.contains("unregister_camera"));
        assert_eq!(socket.stats().messages_sent, 1);

        socket.close().await;
    }

    #[tokio::test]
    async fn test_send_while_closed_drops() {
        let socket = SignalSocket::new(TransportConfig::default());

        // Never connected; must not panic or error
        socket.send(&WireMessage::UnregisterCamera { id: "cam_1".into() });
        assert_eq!(socket.stats().messages_sent, 0);
        assert_eq!(socket.state().status, ConnectionStatus::Idle);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port with nothing listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let socket = SignalSocket::new(test_config(addr).max_retries(0));
        assert!(!socket.connect().await);

        let state = socket.state();
        assert_eq!(state.status, ConnectionStatus::Closed);
        assert!(state.last_error.is_some());

        // Ceiling of 0: no automatic retry may be scheduled
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(socket.stats().reconnect_attempts, 0);
    }

    #[tokio::test]
    async fn test_retry_ceiling_stops_automatic_reconnect() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let socket = SignalSocket::new(
            test_config(addr)
                .base_delay(Duration::from_millis(20))
                .max_delay(Duration::from_millis(40))
                .max_retries(2),
        );
        assert!(!socket.connect().await);

        // Attempts at ~20ms and ~60ms, then the ceiling holds
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(socket.stats().reconnect_attempts, 2);
        assert_eq!(socket.state().retry_count, 2);
        assert_eq!(socket.state().status, ConnectionStatus::Closed);

        // Manual reconnect resets the counter and tries again
        assert!(!socket.reconnect().await);
        assert_eq!(socket.state().retry_count, 1);
    }

    #[tokio::test]
    async fn test_reconnect_after_unexpected_close() {
        // Server whose first connection is dropped right after the handshake
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let mut first = true;
            while let Ok((stream, _)) = listener.accept().await {
                let drop_it = first;
                first = false;
                tokio::spawn(async move {
                    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                    if drop_it {
                        let _ = ws.close(None).await;
                        return;
                    }
                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        });

        let socket = SignalSocket::new(test_config(addr));
        let mut events = socket.subscribe();

        assert!(socket.connect().await);
        assert!(matches!(next_event(&mut events).await, TransportEvent::Opened));

        // Server drops us; expect Closed followed by an automatic re-open
        loop {
            match next_event(&mut events).await {
                TransportEvent::Closed { .. } => break,
                TransportEvent::Error(_) => continue,
                other => panic!("unexpected event: {:?}", other),
            }
        }

        loop {
            match next_event(&mut events).await {
                TransportEvent::Opened => break,
                TransportEvent::Error(_) | TransportEvent::Closed { .. } => continue,
                other => panic!("unexpected event: {:?}", other),
            }
        }

        // Successful open resets the retry counter
        assert_eq!(socket.state().retry_count, 0);
        socket.close().await;
    }

    #[tokio::test]
    async fn test_explicit_close_stops_retries() {
        let (addr, _server_rx) = spawn_server().await;
        let socket = SignalSocket::new(test_config(addr));

        assert!(socket.connect().await);
        socket.close().await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(socket.state().status, ConnectionStatus::Closed);
        assert_eq!(socket.state().retry_count, 0);
    }
}
