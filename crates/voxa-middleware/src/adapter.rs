//! The external-collaborator seams.
//!
//! The runtime never speaks directly to a speech engine or a network channel.
//! It talks to the two traits below, and concrete adapters translate to the
//! outside world.
//!
//! # Overview
//!
//! - [`RemoteSync`] – the shared "latest command" register a second peer
//!   reads and writes.  Implemented by
//!   [`LocalOnly`][crate::register::LocalOnly],
//!   [`RegisterRemote`][crate::register::RegisterRemote] and
//!   [`WsRemote`][crate::ws_remote::WsRemote].
//! - [`Recognizer`] – a black-box keyword spotter producing
//!   [`Hypothesis`] values.

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use tokio::sync::mpsc;
use voxa_types::{CanonicalCommand, Hypothesis, VoxaError};

/// A remote pub/sub channel holding one mutable command register.
///
/// # Contract
///
/// * `publish` – write the command's wire code to the register.  Failures are
///   reported, never retried.
/// * `subscribe` – raw payloads written by *other* peers after the call.
///   The caller normalizes them.  A peer never sees its own writes.
#[async_trait]
pub trait RemoteSync: Send + Sync {
    /// Whether the channel currently reaches a peer.
    fn is_connected(&self) -> bool;

    async fn publish(&self, cmd: CanonicalCommand) -> Result<(), VoxaError>;

    fn subscribe(&self) -> RemoteSubscription;
}

/// Live stream of raw remote payloads.  Dropping it unsubscribes.
pub struct RemoteSubscription {
    stream: Option<BoxStream<'static, String>>,
}

impl RemoteSubscription {
    pub fn new(stream: BoxStream<'static, String>) -> Self {
        Self { stream: Some(stream) }
    }

    /// A subscription that never yields.
    pub fn empty() -> Self {
        Self::new(stream::empty().boxed())
    }

    /// Next raw payload, or `None` once the channel ended or after
    /// [`unsubscribe`][Self::unsubscribe].
    pub async fn recv(&mut self) -> Option<String> {
        match self.stream.as_mut() {
            Some(stream) => stream.next().await,
            None => None,
        }
    }

    pub fn unsubscribe(&mut self) {
        self.stream = None;
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }
}

/// A keyword-spotting engine.
///
/// `start` resolves once the engine confirms it is receiving audio; from then
/// on it pushes every raw hypothesis into `sink` until `stop`.  Gating by
/// confidence and vocabulary happens downstream.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn start(&self, sink: mpsc::Sender<Hypothesis>) -> Result<(), VoxaError>;

    async fn stop(&self) -> Result<(), VoxaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscription_yields_stream_items_then_none() {
        let mut sub =
            RemoteSubscription::new(stream::iter(vec!["R".to_string(), "L".to_string()]).boxed());
        assert_eq!(sub.recv().await.as_deref(), Some("R"));
        assert_eq!(sub.recv().await.as_deref(), Some("L"));
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn unsubscribe_ends_the_stream() {
        let mut sub = RemoteSubscription::new(stream::repeat("F".to_string()).boxed());
        assert!(sub.is_active());
        assert_eq!(sub.recv().await.as_deref(), Some("F"));
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn empty_subscription_is_immediately_done() {
        let mut sub = RemoteSubscription::empty();
        assert_eq!(sub.recv().await, None);
    }
}
