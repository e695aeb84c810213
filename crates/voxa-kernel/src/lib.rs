//! `voxa-kernel` – Command Policy
//!
//! The pure decision layer between raw input and the dispatcher.  Nothing in
//! here owns motion state or talks to the network.
//!
//! # Modules
//!
//! - [`normalizer`] – [`normalize`][normalizer::normalize]: maps recognizer
//!   labels and single-character remote payloads onto
//!   [`CanonicalCommand`][voxa_types::CanonicalCommand].
//! - [`gate`] – [`ConfidenceGate`][gate::ConfidenceGate]: drops recognizer
//!   output outside the monitored vocabulary or below the confidence
//!   threshold before it can reach the dispatcher.
//! - [`power_lock`] – [`PowerLockTracker`][power_lock::PowerLockTracker]:
//!   acquires a wake lock on entry to `Listening` and releases it on every
//!   exit, including the error path.

pub mod gate;
pub mod normalizer;
pub mod power_lock;

pub use gate::{CONFIDENCE_THRESHOLD, ConfidenceGate, MONITORED_WORDS};
pub use normalizer::normalize;
pub use power_lock::{PowerLock, PowerLockTracker, TracingPowerLock};
