use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// The fixed set of symbols the motion core operates on once a raw signal has
/// been normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalCommand {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
    /// Halts autonomous command generation; never moves the target.
    Stop,
}

impl CanonicalCommand {
    /// All commands, motion commands first.
    pub const ALL: [CanonicalCommand; 7] = [
        CanonicalCommand::Forward,
        CanonicalCommand::Backward,
        CanonicalCommand::Left,
        CanonicalCommand::Right,
        CanonicalCommand::Up,
        CanonicalCommand::Down,
        CanonicalCommand::Stop,
    ];

    /// Single-character code written to the remote register.
    pub fn code(self) -> char {
        match self {
            CanonicalCommand::Forward => 'F',
            CanonicalCommand::Backward => 'B',
            CanonicalCommand::Left => 'L',
            CanonicalCommand::Right => 'R',
            CanonicalCommand::Up => 'U',
            CanonicalCommand::Down => 'D',
            CanonicalCommand::Stop => 'S',
        }
    }

    /// Inverse of [`code`][Self::code]. Exact match only; use the kernel
    /// normalizer for tolerant parsing.
    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Upper-case word shown by presentation layers.
    pub fn word(self) -> &'static str {
        match self {
            CanonicalCommand::Forward => "FORWARD",
            CanonicalCommand::Backward => "BACK",
            CanonicalCommand::Left => "LEFT",
            CanonicalCommand::Right => "RIGHT",
            CanonicalCommand::Up => "UP",
            CanonicalCommand::Down => "DOWN",
            CanonicalCommand::Stop => "STOP",
        }
    }

    /// `false` only for [`CanonicalCommand::Stop`].
    pub fn is_motion(self) -> bool {
        !matches!(self, CanonicalCommand::Stop)
    }
}

impl fmt::Display for CanonicalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.word())
    }
}

/// Where a command came from. Only `Local` commands are re-published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    Local,
    Remote,
}

/// A canonical command accepted by the normalizer, consumed once by the
/// dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEvent {
    pub id: Uuid,
    pub command: CanonicalCommand,
    /// Recognizer confidence in `[0, 1]`; remote events carry `1.0`.
    pub confidence: f32,
    pub origin: Origin,
    pub timestamp: DateTime<Utc>,
}

impl CommandEvent {
    /// A locally originated event. `confidence` is clamped into `[0, 1]`
    /// (NaN becomes `0.0`).
    pub fn local(command: CanonicalCommand, confidence: f32) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            id: Uuid::new_v4(),
            command,
            confidence,
            origin: Origin::Local,
            timestamp: Utc::now(),
        }
    }

    /// A remotely received event. The sending peer already gated it, so it
    /// gets the implicit maximum confidence.
    pub fn remote(command: CanonicalCommand) -> Self {
        Self {
            id: Uuid::new_v4(),
            command,
            confidence: 1.0,
            origin: Origin::Remote,
            timestamp: Utc::now(),
        }
    }
}

/// One raw recognizer output, before vocabulary and confidence gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub label: String,
    pub confidence: f32,
}

impl Hypothesis {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Plain 3-component vector in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Read-only view of the motion state handed to presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSnapshot {
    pub current_position: Vec3,
    pub target_position: Vec3,
    pub current_scroll: f32,
    pub target_scroll: f32,
    /// `current_scroll` wrapped into `[0, 1)`.
    pub near_ring: f32,
    /// `current_scroll` wrapped into `[0, 5)`.
    pub far_ring: f32,
    /// Bank angle (radians) derived from lateral velocity.
    pub roll: f32,
    /// Pitch angle (radians) derived from scroll velocity.
    pub pitch: f32,
}

/// Lifecycle of the speech recognition engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionStatus {
    #[default]
    Idle,
    Loading,
    Listening,
    Error,
}

impl fmt::Display for RecognitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecognitionStatus::Idle => "idle",
            RecognitionStatus::Loading => "loading",
            RecognitionStatus::Listening => "listening",
            RecognitionStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Recognition status plus the most recent engine error, if any.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecognitionSession {
    pub status: RecognitionStatus,
    pub last_error: Option<String>,
}

impl RecognitionStatus {
    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// `Idle -> Loading -> Listening -> Idle`, `Loading -> Idle` (cancelled
    /// start), anything `-> Error`, and only `Error -> Loading` out of an
    /// error.
    pub fn can_transition_to(self, next: RecognitionStatus) -> bool {
        use RecognitionStatus as S;
        matches!(
            (self, next),
            (S::Idle, S::Loading)
                | (S::Error, S::Loading)
                | (S::Loading, S::Listening)
                | (S::Loading, S::Idle)
                | (S::Listening, S::Idle)
                | (_, S::Error)
        )
    }
}

impl RecognitionSession {
    /// Move to `next`.
    ///
    /// Returns `Ok(false)` for a same-state no-op and `Ok(true)` on a real
    /// change.  Entering `Loading` clears the previous error.
    pub fn transition(&mut self, next: RecognitionStatus) -> Result<bool, VoxaError> {
        if self.status == next {
            return Ok(false);
        }
        if !self.status.can_transition_to(next) {
            return Err(VoxaError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        if next == RecognitionStatus::Loading {
            self.last_error = None;
        }
        self.status = next;
        Ok(true)
    }

    /// Enter `Error` with a human-readable message.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = RecognitionStatus::Error;
        self.last_error = Some(message.into());
    }
}

/// Unified event wrapper for the in-process event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "voxa-runtime::dispatcher"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the internal event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum EventPayload {
    /// A command the dispatcher has applied.
    Command(CommandEvent),
    /// Motion state after a smoothing tick.
    Motion(MotionSnapshot),
    /// Recognition lifecycle change.
    Recognition(RecognitionSession),
    /// Remote channel availability.
    RemoteLink { connected: bool },
    /// A non-fatal failure worth surfacing (publish errors, engine errors).
    Fault { component: String, message: String },
}

/// Global error type. Every variant is local and non-fatal to the process.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VoxaError {
    #[error("Recognizer unavailable: {0}")]
    RecognizerUnavailable(String),

    #[error("Remote channel unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Remote publish failed: {0}")]
    RemotePublish(String),

    #[error("Invalid recognition transition {from} -> {to}")]
    InvalidTransition {
        from: RecognitionStatus,
        to: RecognitionStatus,
    },

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}
