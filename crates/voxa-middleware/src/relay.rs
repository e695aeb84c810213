//! Register relay: the server side of [`WsRemote`][crate::ws_remote::WsRemote].
//!
//! [`RegisterRelay`] stores the latest value of one logical path, stamps every
//! accepted write with a sequence number and fans it out as a `value` frame to
//! every connected client (the writer included; clients drop their own
//! writes).  Newly connected clients are not sent the stored value.
//!
//! Anything else a client sends is answered with an `error` frame and never
//! reaches the other peers.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use voxa_types::VoxaError;

use crate::register::{MAX_VALUE_LEN, MOVE_PATH, RegisterFrame, RegisterValue};

const FANOUT_CAPACITY: usize = 256;

/// Default relay port.
pub const DEFAULT_RELAY_PORT: u16 = 9400;

/// WebSocket register server.  Clone it cheaply – clones share the register.
#[derive(Clone)]
pub struct RegisterRelay {
    path: Arc<str>,
    latest: Arc<Mutex<Option<RegisterValue>>>,
    fanout: broadcast::Sender<RegisterValue>,
}

impl Default for RegisterRelay {
    fn default() -> Self {
        Self::new(MOVE_PATH)
    }
}

impl RegisterRelay {
    /// A relay accepting writes only to `path`.
    pub fn new(path: &str) -> Self {
        let (fanout, _) = broadcast::channel(FANOUT_CAPACITY);
        Self {
            path: Arc::from(path),
            latest: Arc::new(Mutex::new(None)),
            fanout,
        }
    }

    /// Most recent accepted write.
    pub fn latest(&self) -> Option<RegisterValue> {
        self.latest.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Validate and store one client frame, then fan it out.
    ///
    /// # Errors
    ///
    /// [`VoxaError::Serialization`] for malformed JSON or a non-`set` frame,
    /// [`VoxaError::RemotePublish`] for a foreign path or an oversized value.
    pub fn accept(&self, text: &str) -> Result<RegisterValue, VoxaError> {
        let RegisterFrame::Set {
            path,
            value,
            writer,
        } = RegisterFrame::from_json(text)?
        else {
            return Err(VoxaError::Serialization("expected a set frame".into()));
        };
        if path != *self.path {
            return Err(VoxaError::RemotePublish(format!("unknown path {path:?}")));
        }
        if value.len() > MAX_VALUE_LEN {
            return Err(VoxaError::RemotePublish(format!(
                "value of {} bytes exceeds {MAX_VALUE_LEN}",
                value.len()
            )));
        }

        let stored = {
            let mut latest = self.latest.lock().unwrap_or_else(|p| p.into_inner());
            let seq = latest.as_ref().map_or(1, |prev| prev.seq + 1);
            let stored = RegisterValue { value, writer, seq };
            *latest = Some(stored.clone());
            stored
        };
        // Nobody connected is fine; the value is still stored.
        let _ = self.fanout.send(stored.clone());
        Ok(stored)
    }

    /// Bind `addr` and serve until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`VoxaError::Io`] if the TCP listener cannot be bound.
    pub async fn run(self, addr: SocketAddr) -> Result<(), VoxaError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| VoxaError::Io(format!("relay bind error on {addr}: {e}")))?;
        info!(addr = %addr, path = %self.path, "register relay listening");
        self.serve(listener).await
    }

    /// Serve clients from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), VoxaError> {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let relay = self.clone();
                    // Subscribe before the handshake completes, so a client is
                    // fanned out every write made after its connect returns.
                    let updates = self.fanout.subscribe();
                    tokio::spawn(async move {
                        if let Err(e) = relay.handle_client(stream, peer, updates).await {
                            error!(peer = %peer, error = %e, "relay client error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "relay accept error");
                }
            }
        }
    }

    async fn handle_client(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        mut updates: broadcast::Receiver<RegisterValue>,
    ) -> Result<(), VoxaError> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| VoxaError::Serialization(format!("ws handshake from {peer}: {e}")))?;
        debug!(peer = %peer, "relay client connected");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        loop {
            tokio::select! {
                result = updates.recv() => {
                    match result {
                        Ok(v) => {
                            let frame = RegisterFrame::Value {
                                path: self.path.to_string(),
                                value: v.value,
                                writer: v.writer,
                                seq: v.seq,
                            };
                            if ws_tx.send(Message::Text(frame.to_json()?.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(peer = %peer, lagged_by = n, "relay client lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(_)) => break,
                        Some(Ok(Message::Text(text))) => {
                            if let Err(e) = self.accept(text.as_str()) {
                                warn!(peer = %peer, error = %e, "relay rejected frame");
                                let reply = RegisterFrame::Error { message: e.to_string() };
                                if ws_tx.send(Message::Text(reply.to_json()?.into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        debug!(peer = %peer, "relay client disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::RemoteSync;
    use crate::ws_remote::WsRemote;
    use std::time::Duration;
    use tokio::time::timeout;
    use uuid::Uuid;
    use voxa_types::CanonicalCommand;

    fn set_frame(path: &str, value: &str) -> String {
        format!(r#"{{"op":"set","path":"{path}","value":"{value}","writer":"{}"}}"#, Uuid::new_v4())
    }

    async fn spawn_relay() -> (RegisterRelay, String) {
        let relay = RegisterRelay::default();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(relay.clone().serve(listener));
        (relay, format!("ws://{addr}"))
    }

    #[test]
    fn accept_assigns_increasing_sequence_numbers() {
        let relay = RegisterRelay::default();
        assert_eq!(relay.accept(&set_frame("move", "R")).unwrap().seq, 1);
        assert_eq!(relay.accept(&set_frame("move", "R")).unwrap().seq, 2);
        assert_eq!(relay.latest().unwrap().value, "R");
    }

    #[test]
    fn accept_rejects_foreign_path_and_oversized_value() {
        let relay = RegisterRelay::default();
        assert!(matches!(
            relay.accept(&set_frame("status", "R")),
            Err(VoxaError::RemotePublish(_))
        ));
        assert!(matches!(
            relay.accept(&set_frame("move", "FORWARD-FORWARD-FORWARD")),
            Err(VoxaError::RemotePublish(_))
        ));
        assert!(matches!(relay.accept("not json"), Err(VoxaError::Serialization(_))));
        assert!(relay.latest().is_none());
    }

    #[test]
    fn sixteen_byte_value_is_accepted() {
        let relay = RegisterRelay::default();
        assert!(relay.accept(&set_frame("move", "0123456789abcdef")).is_ok());
    }

    #[tokio::test]
    async fn write_from_one_peer_reaches_the_other_only() {
        let (relay, url) = spawn_relay().await;
        let a = WsRemote::connect(&url).await.unwrap();
        let b = WsRemote::connect(&url).await.unwrap();
        let mut sub_a = a.subscribe();
        let mut sub_b = b.subscribe();

        a.publish(CanonicalCommand::Right).await.unwrap();

        let got = timeout(Duration::from_secs(2), sub_b.recv()).await.unwrap();
        assert_eq!(got.as_deref(), Some("R"));
        assert!(timeout(Duration::from_millis(100), sub_a.recv()).await.is_err());

        let latest = relay.latest().unwrap();
        assert_eq!(latest.writer, a.writer_id());
        assert_eq!(latest.seq, 1);
    }

    #[tokio::test]
    async fn repeated_identical_commands_are_all_delivered() {
        let (_relay, url) = spawn_relay().await;
        let a = WsRemote::connect(&url).await.unwrap();
        let b = WsRemote::connect(&url).await.unwrap();
        let mut sub_b = b.subscribe();

        for _ in 0..3 {
            a.publish(CanonicalCommand::Up).await.unwrap();
        }
        for _ in 0..3 {
            let got = timeout(Duration::from_secs(2), sub_b.recv()).await.unwrap();
            assert_eq!(got.as_deref(), Some("U"));
        }
    }
}
