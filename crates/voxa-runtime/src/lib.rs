//! `voxa-runtime` – The Session Engine
//!
//! Owns one operator session: turns recognizer and remote input into
//! dispatched commands, keeps the motion state ticking and the recognizer
//! lifecycle honest.
//!
//! # Modules
//!
//! - [`dispatcher`] – [`Dispatcher`][dispatcher::Dispatcher]: applies every
//!   command to the shared motion state and queues only locally originated
//!   ones for the remote channel.  [`Publisher`][dispatcher::Publisher]
//!   drains that queue off the dispatch path.
//! - [`recognition`] – [`RecognitionController`][recognition::RecognitionController]:
//!   serialized start/stop of the [`Recognizer`][voxa_middleware::Recognizer],
//!   lifecycle enforcement and wake-lock edges.
//! - [`autopilot`] – [`Autopilot`][autopilot::Autopilot]: cycles a fixed
//!   command sequence until a `Stop`.
//! - [`session`] – [`Session`][session::Session]: constructs and tears down
//!   everything above plus the ticker and pump tasks.
//! - [`sim`] – [`SimRecognizer`][sim::SimRecognizer]: hand-driven recognizer
//!   for hosts without a speech engine.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console
//!   logging plus optional OTLP span export.

pub mod autopilot;
pub mod dispatcher;
pub mod recognition;
pub mod session;
pub mod sim;
pub mod telemetry;

pub use autopilot::{AUTOPILOT_SEQUENCE, Autopilot, DEFAULT_AUTOPILOT_PERIOD};
pub use dispatcher::{DispatchOutcome, Dispatcher, Outbox, Publisher};
pub use recognition::RecognitionController;
pub use session::{Session, SessionConfig};
pub use sim::SimRecognizer;
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
