//! [`MotionHandle`] – serialized shared access to one [`MotionState`].
//!
//! Command producers (recognizer, remote channel, autopilot) and the smoothing
//! ticker run on different tasks.  Every operation here takes the same lock,
//! so an `apply_command` can never interleave with an `advance` and readers
//! never observe a half-updated target.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use voxa_types::{CanonicalCommand, MotionSnapshot};

use crate::state::{MotionConfig, MotionState};

/// Cheaply cloneable handle; all clones share the same state.
#[derive(Clone, Debug)]
pub struct MotionHandle {
    inner: Arc<Mutex<MotionState>>,
}

impl Default for MotionHandle {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}

impl MotionHandle {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MotionState::new(config))),
        }
    }

    /// See [`MotionState::apply_command`].
    pub fn apply_command(&self, cmd: CanonicalCommand) -> bool {
        self.lock().apply_command(cmd)
    }

    /// See [`MotionState::advance`].
    pub fn advance(&self) -> MotionSnapshot {
        let mut state = self.lock();
        state.advance();
        state.snapshot()
    }

    /// See [`MotionState::advance_for`].
    pub fn advance_for(&self, dt: Duration) -> MotionSnapshot {
        let mut state = self.lock();
        state.advance_for(dt);
        state.snapshot()
    }

    pub fn snapshot(&self) -> MotionSnapshot {
        self.lock().snapshot()
    }

    /// Run `f` with exclusive access.  Keep it short; the ticker waits on it.
    pub fn with<R>(&self, f: impl FnOnce(&mut MotionState) -> R) -> R {
        f(&mut self.lock())
    }

    // A panic inside `with` poisons the mutex; the state itself is still
    // consistent (every mutation re-clamps), so keep serving it.
    fn lock(&self) -> MutexGuard<'_, MotionState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
