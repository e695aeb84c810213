//! `voxa-cockpit` – The read-only presentation server
//!
//! Boots a lightweight HTTP + WebSocket server (default port `8080`) that:
//!
//! 1. **Serves** the embedded cockpit page at every non-WebSocket HTTP path.
//! 2. **Streams** the [`Topic::Motion`], [`Topic::Commands`] and
//!    [`Topic::Status`] lanes of the [`EventBus`] to every connected browser as
//!    JSON, so the page can draw the current position, flash the last command
//!    and show recognizer and remote-link state.
//!
//! Browsers have no write path.  Frames they send are read and discarded.
//!
//! # Usage
//!
//! ```rust,no_run
//! use voxa_cockpit::CockpitServer;
//! use voxa_middleware::EventBus;
//!
//! #[tokio::main]
//! async fn main() {
//!     let bus = EventBus::default();
//!     CockpitServer::new(bus)
//!         .with_port(8080)
//!         .run()
//!         .await
//!         .expect("cockpit server failed");
//! }
//! ```
//!
//! [`EventBus`]: voxa_middleware::EventBus
//! [`Topic::Motion`]: voxa_middleware::Topic::Motion
//! [`Topic::Commands`]: voxa_middleware::Topic::Commands
//! [`Topic::Status`]: voxa_middleware::Topic::Status

pub mod server;

pub use server::{CockpitServer, DEFAULT_PORT};
