//! [`CockpitServer`] – HTTP + WebSocket server for the cockpit page.
//!
//! Listens on `0.0.0.0:8080` (configurable via [`CockpitServer::with_port`]).
//!
//! * Regular HTTP requests → 200 OK with the embedded cockpit HTML.
//! * WebSocket upgrades → one-way stream of bus events as JSON text frames.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use voxa_middleware::{EventBus, Topic, TopicReceiver};
use voxa_types::{Event, VoxaError};

/// Default TCP port for the cockpit HTTP/WebSocket server.
pub const DEFAULT_PORT: u16 = 8080;

/// Motion snapshots arrive at the tick rate; browsers get at most this many
/// per second.
const DEFAULT_MOTION_FPS: u32 = 30;

/// The compiled-in cockpit page (HTML + CSS + JS).
const COCKPIT_HTML: &str = include_str!("cockpit.html");

/// Serves the cockpit page and streams the Motion, Commands and Status topics
/// to every connected browser.
///
/// # Example
///
/// ```rust,no_run
/// use voxa_middleware::EventBus;
/// use voxa_cockpit::CockpitServer;
///
/// #[tokio::main]
/// async fn main() {
///     let bus = EventBus::default();
///     CockpitServer::new(bus.clone())
///         .run()
///         .await
///         .expect("cockpit server failed");
/// }
/// ```
pub struct CockpitServer {
    bus: EventBus,
    port: u16,
    motion_interval: Duration,
}

impl CockpitServer {
    /// Create a server backed by `bus` on the [`DEFAULT_PORT`].
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            port: DEFAULT_PORT,
            motion_interval: Duration::from_secs(1) / DEFAULT_MOTION_FPS,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Cap motion frames per client; `0` forwards every snapshot.
    pub fn with_motion_fps(mut self, fps: u32) -> Self {
        self.motion_interval = if fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / fps
        };
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bind `0.0.0.0:<port>` and serve until the process exits.
    ///
    /// # Errors
    ///
    /// Returns [`VoxaError::Io`] if the TCP listener cannot bind.
    pub async fn run(self) -> Result<(), VoxaError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| VoxaError::Io(format!("cockpit bind error on {addr}: {e}")))?;
        info!(url = %format!("http://localhost:{}", self.port), "cockpit listening");
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), VoxaError> {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let bus = self.bus.clone();
                    let motion_interval = self.motion_interval;
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, bus, motion_interval).await {
                            warn!(peer = %peer, error = %e, "cockpit client error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "cockpit accept error");
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    bus: EventBus,
    motion_interval: Duration,
) -> Result<(), VoxaError> {
    // `peek` leaves the request in place for tungstenite's handshake.
    let mut buf = [0u8; 1024];
    let n = stream
        .peek(&mut buf)
        .await
        .map_err(|e| VoxaError::Io(format!("peek error from {peer}: {e}")))?;

    if is_websocket_upgrade(&buf[..n]) {
        handle_ws(stream, peer, bus, motion_interval).await
    } else {
        serve_html(stream).await
    }
}

fn is_websocket_upgrade(head: &[u8]) -> bool {
    String::from_utf8_lossy(head).lines().any(|line| {
        let line = line.to_ascii_lowercase();
        line.starts_with("upgrade:") && line.contains("websocket")
    })
}

async fn serve_html(mut stream: TcpStream) -> Result<(), VoxaError> {
    let body = COCKPIT_HTML;
    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        body.len(),
        body
    );
    stream
        .write_all(response.as_bytes())
        .await
        .map_err(|e| VoxaError::Io(format!("HTTP write error: {e}")))?;
    Ok(())
}

async fn handle_ws(
    stream: TcpStream,
    peer: SocketAddr,
    bus: EventBus,
    motion_interval: Duration,
) -> Result<(), VoxaError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| VoxaError::Serialization(format!("ws handshake from {peer}: {e}")))?;
    debug!(peer = %peer, "cockpit client connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let mut motion = bus.subscribe_to(Topic::Motion);
    let mut commands = bus.subscribe_to(Topic::Commands);
    let mut status = bus.subscribe_to(Topic::Status);
    let mut last_motion: Option<Instant> = None;

    loop {
        let event = tokio::select! {
            result = motion.recv() => {
                let now = Instant::now();
                if last_motion.is_some_and(|t| now.duration_since(t) < motion_interval) {
                    continue;
                }
                match forwardable(result, &motion, peer) {
                    Some(Ok(event)) => {
                        last_motion = Some(now);
                        event
                    }
                    Some(Err(())) => break,
                    None => continue,
                }
            }
            result = commands.recv() => match forwardable(result, &commands, peer) {
                Some(Ok(event)) => event,
                Some(Err(())) => break,
                None => continue,
            },
            result = status.recv() => match forwardable(result, &status, peer) {
                Some(Ok(event)) => event,
                Some(Err(())) => break,
                None => continue,
            },
            // Read-only: upstream text is dropped, only close matters.
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            },
        };

        match serde_json::to_string(&event) {
            Ok(json) => {
                if ws_tx.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            Err(e) => error!(error = %e, "cockpit serialization error"),
        }
    }

    debug!(peer = %peer, "cockpit client disconnected");
    Ok(())
}

/// `Some(Ok)` to forward, `None` to skip a lag notice, `Some(Err)` when the
/// bus is gone.
fn forwardable(
    result: Result<Event, RecvError>,
    rx: &TopicReceiver,
    peer: SocketAddr,
) -> Option<Result<Event, ()>> {
    match result {
        Ok(event) => Some(Ok(event)),
        Err(RecvError::Lagged(n)) => {
            debug!(peer = %peer, topic = ?rx.topic(), lagged_by = n, "cockpit client lagged");
            None
        }
        Err(RecvError::Closed) => Some(Err(())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::time::timeout;
    use tokio_tungstenite::connect_async;
    use voxa_types::{CanonicalCommand, CommandEvent, EventPayload, RecognitionSession, RecognitionStatus};

    async fn spawn_server(bus: EventBus) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(CockpitServer::new(bus).with_motion_fps(0).serve(listener));
        addr
    }

    async fn wait_for_subscribers(bus: &EventBus, topic: Topic) {
        timeout(Duration::from_secs(2), async {
            while bus.subscriber_count(topic) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[test]
    fn default_port_is_8080() {
        let server = CockpitServer::new(EventBus::default());
        assert_eq!(server.port(), DEFAULT_PORT);
        assert_eq!(server.with_port(9999).port(), 9999);
    }

    #[test]
    fn upgrade_detection_is_case_insensitive() {
        assert!(is_websocket_upgrade(b"GET / HTTP/1.1\r\nUpgrade: WebSocket\r\n\r\n"));
        assert!(is_websocket_upgrade(b"GET / HTTP/1.1\r\nupgrade: websocket\r\n\r\n"));
        assert!(!is_websocket_upgrade(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n"));
    }

    #[test]
    fn cockpit_html_opens_a_websocket() {
        assert!(COCKPIT_HTML.contains("WebSocket"));
        assert!(COCKPIT_HTML.contains("Motion"));
    }

    #[tokio::test]
    async fn plain_http_gets_the_page() {
        let addr = spawn_server(EventBus::default()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        timeout(Duration::from_secs(2), stream.read_to_string(&mut response))
            .await
            .unwrap()
            .unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("<html"));
    }

    #[tokio::test]
    async fn websocket_streams_bus_events_and_ignores_upstream() {
        let bus = EventBus::default();
        let addr = spawn_server(bus.clone()).await;
        let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        wait_for_subscribers(&bus, Topic::Status).await;

        // Upstream frames have no effect.
        ws.send(Message::Text(r#"{"op":"set","value":"R"}"#.to_string().into()))
            .await
            .unwrap();

        bus.publish_to(
            Topic::Commands,
            Event::new("test", EventPayload::Command(CommandEvent::remote(CanonicalCommand::Up))),
        )
        .unwrap();
        let frame = timeout(Duration::from_secs(2), ws.next()).await.unwrap().unwrap().unwrap();
        let text = frame.into_text().unwrap();
        assert!(text.contains(r#""kind":"Command""#));

        bus.publish_to(
            Topic::Status,
            Event::new(
                "test",
                EventPayload::Recognition(RecognitionSession {
                    status: RecognitionStatus::Listening,
                    last_error: None,
                }),
            ),
        )
        .unwrap();
        let frame = timeout(Duration::from_secs(2), ws.next()).await.unwrap().unwrap().unwrap();
        assert!(frame.into_text().unwrap().contains("listening"));
    }
}
