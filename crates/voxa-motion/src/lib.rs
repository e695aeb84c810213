//! `voxa-motion` – Motion State
//!
//! Turns discrete canonical commands into bounded, continuously smoothed
//! position state.
//!
//! # Modules
//!
//! - [`state`] – [`MotionState`][state::MotionState]: target/current
//!   position and scroll, clamping, per-tick and elapsed-time smoothing,
//!   attitude derived from velocity.
//! - [`smoothing`] – exponential approach, frame-rate independent factor and
//!   ring wrap-around helpers.
//! - [`handle`] – [`MotionHandle`][handle::MotionHandle]: the lock-serialized
//!   shared handle the runtime hands to producers and the ticker.
//!
//! # Example
//!
//! ```rust
//! use voxa_motion::MotionHandle;
//! use voxa_types::CanonicalCommand;
//!
//! let motion = MotionHandle::default();
//! motion.apply_command(CanonicalCommand::Right);
//! let snap = motion.advance();
//! assert!(snap.current_position.x > 0.0);
//! assert!(snap.current_position.x < snap.target_position.x);
//! ```

pub mod handle;
pub mod smoothing;
pub mod state;

pub use handle::MotionHandle;
pub use state::{MotionConfig, MotionState};
