//! WebSocket client for a [`RegisterRelay`][crate::relay::RegisterRelay].
//!
//! [`WsRemote::connect`] opens one connection and splits it into two tasks:
//!
//! 1. **Writer** – drains an outbound queue of `set` frames into the socket.
//! 2. **Reader** – parses `value` frames, drops the ones this peer wrote, and
//!    fans the rest out to every [`RemoteSubscription`].
//!
//! When the reader sees the socket close, the remote is marked disconnected
//! and further publishes fail with [`VoxaError::RemoteUnavailable`].  There is
//! no reconnect; the next session starts a new connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::stream::{self, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use uuid::Uuid;
use voxa_types::{CanonicalCommand, VoxaError};

use crate::adapter::{RemoteSubscription, RemoteSync};
use crate::register::{LocalOnly, MOVE_PATH, RegisterFrame};

/// Buffered remote values per subscriber before the oldest are dropped.
const FANOUT_CAPACITY: usize = 64;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A [`RemoteSync`] backed by a relay connection.
pub struct WsRemote {
    writer: Uuid,
    connected: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<Message>,
    fanout: broadcast::Sender<String>,
    tasks: Vec<JoinHandle<()>>,
}

impl WsRemote {
    /// Connect to `url` (`ws://host:port`).
    ///
    /// # Errors
    ///
    /// [`VoxaError::RemoteUnavailable`] when the handshake fails.
    pub async fn connect(url: &str) -> Result<Self, VoxaError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| VoxaError::RemoteUnavailable(format!("{url}: {e}")))?;
        let (mut ws_tx, ws_rx) = ws_stream.split();

        let writer = Uuid::new_v4();
        let connected = Arc::new(AtomicBool::new(true));
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (fanout, _) = broadcast::channel(FANOUT_CAPACITY);

        let write_task = {
            let connected = Arc::clone(&connected);
            tokio::spawn(async move {
                while let Some(msg) = outbound_rx.recv().await {
                    if let Err(e) = ws_tx.send(msg).await {
                        warn!(error = %e, "relay send failed");
                        connected.store(false, Ordering::SeqCst);
                        break;
                    }
                }
                let _ = ws_tx.close().await;
            })
        };

        let read_task = tokio::spawn(read_loop(
            ws_rx,
            writer,
            Arc::clone(&connected),
            fanout.clone(),
        ));

        info!(url = %url, writer = %writer, "connected to relay");
        Ok(Self {
            writer,
            connected,
            outbound,
            fanout,
            tasks: vec![write_task, read_task],
        })
    }

    pub fn writer_id(&self) -> Uuid {
        self.writer
    }
}

async fn read_loop(
    mut ws_rx: SplitStream<WsStream>,
    me: Uuid,
    connected: Arc<AtomicBool>,
    fanout: broadcast::Sender<String>,
) {
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => match RegisterFrame::from_json(text.as_str()) {
                Ok(RegisterFrame::Value {
                    path,
                    value,
                    writer,
                    seq,
                }) => {
                    if path != MOVE_PATH || writer == me {
                        continue;
                    }
                    debug!(seq, value = %value, "remote value");
                    // No subscribers is fine; the value is simply not observed.
                    let _ = fanout.send(value);
                }
                Ok(RegisterFrame::Error { message }) => {
                    warn!(message = %message, "relay rejected write");
                }
                Ok(RegisterFrame::Set { .. }) => {}
                Err(e) => debug!(error = %e, "ignoring malformed relay frame"),
            },
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
    connected.store(false, Ordering::SeqCst);
    warn!("relay connection closed");
}

impl Drop for WsRemote {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[async_trait]
impl RemoteSync for WsRemote {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, cmd: CanonicalCommand) -> Result<(), VoxaError> {
        if !self.is_connected() {
            return Err(VoxaError::RemoteUnavailable("relay connection closed".into()));
        }
        let json = RegisterFrame::set(cmd, self.writer).to_json()?;
        self.outbound
            .send(Message::Text(json.into()))
            .map_err(|e| VoxaError::RemotePublish(e.to_string()))
    }

    fn subscribe(&self) -> RemoteSubscription {
        let rx = self.fanout.subscribe();
        let stream = stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(value) => return Some((value, rx)),
                    // Coalescing is acceptable for a last-write-wins register.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        RemoteSubscription::new(stream.boxed())
    }
}

/// Pick the remote for a session.
///
/// An empty `url` selects [`LocalOnly`] silently.  A configured but
/// unreachable relay logs a warning and also falls back to [`LocalOnly`].
pub async fn connect_remote(url: &str) -> Arc<dyn RemoteSync> {
    let url = url.trim();
    if url.is_empty() {
        debug!("no relay configured; running local-only");
        return Arc::new(LocalOnly);
    }
    match WsRemote::connect(url).await {
        Ok(remote) => Arc::new(remote),
        Err(e) => {
            warn!(error = %e, "relay unreachable; running local-only");
            Arc::new(LocalOnly)
        }
    }
}
