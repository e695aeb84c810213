//! [`PowerLockTracker`] – ties a power-management lock to the recognition
//! lifecycle.
//!
//! While the recognizer is listening the device must not sleep.  The tracker
//! watches [`RecognitionStatus`] transitions and calls
//! [`PowerLock::acquire`] exactly on entry to `Listening` and
//! [`PowerLock::release`] exactly on exit from it, whichever state follows
//! (including `Error`).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use voxa_kernel::power_lock::{PowerLockTracker, TracingPowerLock};
//! use voxa_types::RecognitionStatus;
//!
//! let mut tracker = PowerLockTracker::new(Arc::new(TracingPowerLock::default()));
//! tracker.observe(RecognitionStatus::Loading);
//! tracker.observe(RecognitionStatus::Listening);
//! assert!(tracker.is_held());
//! tracker.observe(RecognitionStatus::Error);
//! assert!(!tracker.is_held());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};
use voxa_types::RecognitionStatus;

/// A platform power-management lock (screen/CPU wake lock).
///
/// Implementations must be cheap and non-blocking; failures are the
/// implementation's to log, they never propagate into the lifecycle.
pub trait PowerLock: Send + Sync {
    fn acquire(&self);
    fn release(&self);
}

/// A [`PowerLock`] that only records its state in the log.  Used where no
/// platform wake-lock exists (headless hosts, the CLI).
#[derive(Debug, Default)]
pub struct TracingPowerLock {
    held: AtomicBool,
}

impl TracingPowerLock {
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

impl PowerLock for TracingPowerLock {
    fn acquire(&self) {
        self.held.store(true, Ordering::SeqCst);
        info!("wake lock acquired");
    }

    fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        info!("wake lock released");
    }
}

/// Edge detector between recognition status changes and a [`PowerLock`].
pub struct PowerLockTracker {
    lock: Arc<dyn PowerLock>,
    previous: RecognitionStatus,
    held: bool,
}

impl PowerLockTracker {
    /// Start tracking from [`RecognitionStatus::Idle`].
    pub fn new(lock: Arc<dyn PowerLock>) -> Self {
        Self {
            lock,
            previous: RecognitionStatus::Idle,
            held: false,
        }
    }

    /// Feed the status the recognizer has just entered.
    pub fn observe(&mut self, next: RecognitionStatus) {
        let prev = self.previous;
        self.previous = next;

        if prev != RecognitionStatus::Listening && next == RecognitionStatus::Listening {
            self.lock.acquire();
            self.held = true;
        } else if prev == RecognitionStatus::Listening && next != RecognitionStatus::Listening {
            self.lock.release();
            self.held = false;
        } else {
            debug!(from = %prev, to = %next, "status change without power edge");
        }
    }

    /// Release the lock if still held.  Called on session teardown.
    pub fn release_if_held(&mut self) {
        if self.held {
            self.lock.release();
            self.held = false;
        }
        self.previous = RecognitionStatus::Idle;
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}
