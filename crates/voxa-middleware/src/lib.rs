//! `voxa-middleware` – The Nervous System
//!
//! Routes data between the session core and its external collaborators
//! without caring about the data's meaning.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, topic-based publish/subscribe event bus built
//!   on Tokio broadcast channels.
//! - [`adapter`] – The [`RemoteSync`] and [`Recognizer`] traits every external
//!   collaborator implements.
//! - [`register`] – The last-write-wins command register: wire frames, an
//!   in-process implementation and the [`LocalOnly`] fallback.
//! - [`ws_remote`] – [`WsRemote`], a WebSocket client for a relay, and
//!   [`connect_remote`], which picks the remote for a session.
//! - [`relay`] – [`RegisterRelay`], the WebSocket server peers share.

pub mod adapter;
pub mod bus;
pub mod register;
pub mod relay;
pub mod ws_remote;

pub use adapter::{Recognizer, RemoteSubscription, RemoteSync};
pub use bus::{EventBus, Topic, TopicReceiver};
pub use register::{LocalOnly, RegisterFrame, RegisterRemote, RegisterValue, SharedRegister};
pub use relay::RegisterRelay;
pub use ws_remote::{WsRemote, connect_remote};
