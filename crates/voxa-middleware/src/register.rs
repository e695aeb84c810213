//! The command register and its in-process adapters.
//!
//! A remote channel is not a log.  It is one mutable value at a logical path
//! (`move`), overwritten by whichever peer wrote last.  Every write carries the
//! writer's id, so a peer can recognise and skip its own writes, and a
//! sequence number, so two identical consecutive commands are still two
//! changes.
//!
//! - [`RegisterFrame`] – the JSON wire frames shared by
//!   [`WsRemote`][crate::ws_remote::WsRemote] and
//!   [`RegisterRelay`][crate::relay::RegisterRelay].
//! - [`SharedRegister`] + [`RegisterRemote`] – same-process peers.
//! - [`LocalOnly`] – the silent fallback when no remote is configured.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;
use voxa_types::{CanonicalCommand, VoxaError};

use crate::adapter::{RemoteSubscription, RemoteSync};

/// Logical address of the command register.
pub const MOVE_PATH: &str = "move";

/// Longest accepted register value, in bytes.
pub const MAX_VALUE_LEN: usize = 16;

/// One accepted write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterValue {
    pub value: String,
    pub writer: Uuid,
    pub seq: u64,
}

/// JSON frame exchanged with a relay.
///
/// ```json
/// {"op":"set","path":"move","value":"R","writer":"…"}
/// {"op":"value","path":"move","value":"R","writer":"…","seq":7}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum RegisterFrame {
    /// Client → relay.
    Set {
        path: String,
        value: String,
        writer: Uuid,
    },
    /// Relay → every client.
    Value {
        path: String,
        value: String,
        writer: Uuid,
        seq: u64,
    },
    /// Relay → offending client.
    Error { message: String },
}

impl RegisterFrame {
    pub fn set(cmd: CanonicalCommand, writer: Uuid) -> Self {
        Self::Set {
            path: MOVE_PATH.to_string(),
            value: cmd.code().to_string(),
            writer,
        }
    }

    pub fn to_json(&self) -> Result<String, VoxaError> {
        serde_json::to_string(self).map_err(|e| VoxaError::Serialization(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, VoxaError> {
        serde_json::from_str(text).map_err(|e| VoxaError::Serialization(e.to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-process register
// ────────────────────────────────────────────────────────────────────────────

/// In-process register shared by any number of [`RegisterRemote`] peers.
#[derive(Clone, Debug)]
pub struct SharedRegister {
    tx: Arc<watch::Sender<Option<RegisterValue>>>,
}

impl Default for SharedRegister {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedRegister {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Overwrite the register; returns the stored value with its sequence
    /// number.
    pub fn write(&self, value: impl Into<String>, writer: Uuid) -> RegisterValue {
        let mut stored = RegisterValue {
            value: value.into(),
            writer,
            seq: 0,
        };
        self.tx.send_modify(|slot| {
            stored.seq = slot.as_ref().map_or(1, |prev| prev.seq + 1);
            *slot = Some(stored.clone());
        });
        stored
    }

    pub fn latest(&self) -> Option<RegisterValue> {
        self.tx.borrow().clone()
    }

    /// A new peer with a fresh writer id.
    pub fn peer(&self) -> RegisterRemote {
        RegisterRemote {
            register: self.clone(),
            writer: Uuid::new_v4(),
        }
    }
}

/// One peer attached to a [`SharedRegister`].
#[derive(Clone, Debug)]
pub struct RegisterRemote {
    register: SharedRegister,
    writer: Uuid,
}

impl RegisterRemote {
    pub fn writer_id(&self) -> Uuid {
        self.writer
    }
}

#[async_trait]
impl RemoteSync for RegisterRemote {
    fn is_connected(&self) -> bool {
        true
    }

    async fn publish(&self, cmd: CanonicalCommand) -> Result<(), VoxaError> {
        let stored = self.register.write(cmd.code().to_string(), self.writer);
        debug!(writer = %self.writer, seq = stored.seq, value = %stored.value, "register write");
        Ok(())
    }

    fn subscribe(&self) -> RemoteSubscription {
        // A fresh receiver has already "seen" the current value, so nothing
        // written before this call is delivered.
        let rx = self.register.tx.subscribe();
        let me = self.writer;
        let stream = stream::unfold(rx, move |mut rx| async move {
            loop {
                rx.changed().await.ok()?;
                let latest = rx.borrow_and_update().clone();
                match latest {
                    Some(v) if v.writer != me => return Some((v.value, rx)),
                    _ => continue,
                }
            }
        });
        RemoteSubscription::new(stream.boxed())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Local-only fallback
// ────────────────────────────────────────────────────────────────────────────

/// No remote peer: publish succeeds and goes nowhere, subscribe yields
/// nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalOnly;

#[async_trait]
impl RemoteSync for LocalOnly {
    fn is_connected(&self) -> bool {
        false
    }

    async fn publish(&self, _cmd: CanonicalCommand) -> Result<(), VoxaError> {
        Ok(())
    }

    fn subscribe(&self) -> RemoteSubscription {
        RemoteSubscription::empty()
    }
}
