//! [`RecognitionController`] – owns the recognizer lifecycle.
//!
//! The controller is the only writer of the [`RecognitionSession`].  It
//! enforces the lifecycle rules, keeps the wake lock in step with
//! `Listening`, mirrors every change into a watch channel and onto
//! [`Topic::Status`], and hands recognizer output to the session through a
//! bounded hypothesis channel.
//!
//! `start` and `stop` hold the same async mutex for their whole duration, so a
//! stop is fully awaited before the next start can begin and two recognizer
//! sessions never overlap.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tracing::{info, warn};
use voxa_kernel::{PowerLock, PowerLockTracker};
use voxa_middleware::{EventBus, Recognizer, Topic};
use voxa_types::{Event, EventPayload, Hypothesis, RecognitionSession, RecognitionStatus, VoxaError};

const SOURCE: &str = "voxa-runtime::recognition";

/// Hypotheses buffered between the recognizer and the gate.
const HYPOTHESIS_CAPACITY: usize = 64;

struct Lifecycle {
    session: RecognitionSession,
    power: PowerLockTracker,
}

pub struct RecognitionController {
    recognizer: Arc<dyn Recognizer>,
    sink: mpsc::Sender<Hypothesis>,
    lifecycle: Mutex<Lifecycle>,
    status: watch::Sender<RecognitionSession>,
    bus: EventBus,
}

impl RecognitionController {
    /// Build a controller and the receiving end of its hypothesis channel.
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        power: Arc<dyn PowerLock>,
        bus: EventBus,
    ) -> (Self, mpsc::Receiver<Hypothesis>) {
        let (sink, hypotheses) = mpsc::channel(HYPOTHESIS_CAPACITY);
        let (status, _) = watch::channel(RecognitionSession::default());
        let controller = Self {
            recognizer,
            sink,
            lifecycle: Mutex::new(Lifecycle {
                session: RecognitionSession::default(),
                power: PowerLockTracker::new(power),
            }),
            status,
            bus,
        };
        (controller, hypotheses)
    }

    /// Start listening.  A no-op while already listening.
    ///
    /// # Errors
    ///
    /// [`VoxaError::RecognizerUnavailable`] when the engine cannot start; the
    /// session is left in `Error` with the message and a later `start` retries.
    pub async fn start(&self) -> Result<(), VoxaError> {
        let mut lc = self.lifecycle.lock().await;
        if lc.session.status == RecognitionStatus::Listening {
            return Ok(());
        }
        self.enter(&mut lc, RecognitionStatus::Loading)?;

        match self.recognizer.start(self.sink.clone()).await {
            Ok(()) => self.enter(&mut lc, RecognitionStatus::Listening),
            Err(e) => {
                let message = match e {
                    VoxaError::RecognizerUnavailable(m) => m,
                    other => other.to_string(),
                };
                warn!(error = %message, "recognizer failed to start");
                self.fail_locked(&mut lc, message.clone());
                Err(VoxaError::RecognizerUnavailable(message))
            }
        }
    }

    /// Stop listening.  Recognizer errors are logged and swallowed.
    ///
    /// Ends in `Idle` unless the session is in `Error`, which only a new
    /// `start` leaves.
    pub async fn stop(&self) {
        let mut lc = self.lifecycle.lock().await;
        match lc.session.status {
            RecognitionStatus::Idle | RecognitionStatus::Error => return,
            RecognitionStatus::Loading | RecognitionStatus::Listening => {}
        }
        if let Err(e) = self.recognizer.stop().await {
            warn!(error = %e, "recognizer stop failed");
        }
        if let Err(e) = self.enter(&mut lc, RecognitionStatus::Idle) {
            warn!(error = %e, "unexpected recognition state on stop");
        }
    }

    /// Stop, then drop the wake lock whatever state the session ended in.
    pub async fn shutdown(&self) {
        self.stop().await;
        self.lifecycle.lock().await.power.release_if_held();
    }

    /// Record a runtime engine failure (e.g. the audio device vanished).
    pub async fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        let mut lc = self.lifecycle.lock().await;
        if let Err(e) = self.recognizer.stop().await {
            warn!(error = %e, "recognizer stop after failure failed");
        }
        warn!(error = %message, "recognizer failed");
        self.fail_locked(&mut lc, message);
    }

    pub fn session(&self) -> RecognitionSession {
        self.status.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<RecognitionSession> {
        self.status.subscribe()
    }

    pub async fn power_held(&self) -> bool {
        self.lifecycle.lock().await.power.is_held()
    }

    fn enter(&self, lc: &mut Lifecycle, next: RecognitionStatus) -> Result<(), VoxaError> {
        if lc.session.transition(next)? {
            lc.power.observe(next);
            info!(status = %next, "recognition status");
            self.announce(&lc.session);
        }
        Ok(())
    }

    fn fail_locked(&self, lc: &mut Lifecycle, message: String) {
        lc.session.fail(message);
        lc.power.observe(RecognitionStatus::Error);
        self.announce(&lc.session);
    }

    fn announce(&self, session: &RecognitionSession) {
        self.status.send_replace(session.clone());
        let _ = self.bus.publish_to(
            Topic::Status,
            Event::new(SOURCE, EventPayload::Recognition(session.clone())),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use voxa_kernel::TracingPowerLock;

    /// Counts calls; fails `start` while `fail_start` is set.
    #[derive(Default)]
    struct MockRecognizer {
        fail_start: AtomicBool,
        fail_stop: bool,
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    #[async_trait]
    impl Recognizer for MockRecognizer {
        async fn start(&self, _sink: mpsc::Sender<Hypothesis>) -> Result<(), VoxaError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start.load(Ordering::SeqCst) {
                Err(VoxaError::RecognizerUnavailable("microphone permission denied".into()))
            } else {
                Ok(())
            }
        }

        async fn stop(&self) -> Result<(), VoxaError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if self.fail_stop {
                Err(VoxaError::Io("device busy".into()))
            } else {
                Ok(())
            }
        }
    }

    fn controller(
        recognizer: Arc<MockRecognizer>,
    ) -> (RecognitionController, Arc<TracingPowerLock>, EventBus) {
        let lock = Arc::new(TracingPowerLock::default());
        let bus = EventBus::default();
        let (c, _rx) = RecognitionController::new(recognizer, lock.clone(), bus.clone());
        (c, lock, bus)
    }

    #[tokio::test]
    async fn start_reaches_listening_and_takes_power_lock() {
        let rec = Arc::new(MockRecognizer::default());
        let (c, lock, _bus) = controller(rec.clone());

        c.start().await.unwrap();
        assert_eq!(c.session().status, RecognitionStatus::Listening);
        assert!(lock.is_held());
        assert!(c.power_held().await);

        // Second start is a no-op.
        c.start().await.unwrap();
        assert_eq!(rec.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_returns_to_idle_and_releases() {
        let rec = Arc::new(MockRecognizer::default());
        let (c, lock, _bus) = controller(rec.clone());

        c.start().await.unwrap();
        c.stop().await;
        assert_eq!(c.session().status, RecognitionStatus::Idle);
        assert!(!lock.is_held());
        assert_eq!(rec.stops.load(Ordering::SeqCst), 1);

        // Stopping while idle does not touch the recognizer.
        c.stop().await;
        assert_eq!(rec.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_swallows_recognizer_errors() {
        let rec = Arc::new(MockRecognizer {
            fail_stop: true,
            ..Default::default()
        });
        let (c, lock, _bus) = controller(rec);

        c.start().await.unwrap();
        c.stop().await;
        assert_eq!(c.session().status, RecognitionStatus::Idle);
        assert!(!lock.is_held());
    }

    #[tokio::test]
    async fn unavailable_engine_surfaces_error_and_allows_retry() {
        let rec = Arc::new(MockRecognizer::default());
        rec.fail_start.store(true, Ordering::SeqCst);
        let (c, lock, _bus) = controller(rec.clone());

        let err = c.start().await.unwrap_err();
        assert_eq!(
            err,
            VoxaError::RecognizerUnavailable("microphone permission denied".into())
        );
        let session = c.session();
        assert_eq!(session.status, RecognitionStatus::Error);
        assert_eq!(session.last_error.as_deref(), Some("microphone permission denied"));
        assert!(!lock.is_held());

        rec.fail_start.store(false, Ordering::SeqCst);
        c.start().await.unwrap();
        let session = c.session();
        assert_eq!(session.status, RecognitionStatus::Listening);
        assert_eq!(session.last_error, None);
        assert!(lock.is_held());
    }

    #[tokio::test]
    async fn runtime_failure_releases_power_lock() {
        let rec = Arc::new(MockRecognizer::default());
        let (c, lock, _bus) = controller(rec.clone());

        c.start().await.unwrap();
        assert!(lock.is_held());
        c.fail("audio device lost").await;

        assert_eq!(c.session().status, RecognitionStatus::Error);
        assert!(!lock.is_held());
        assert_eq!(rec.stops.load(Ordering::SeqCst), 1);

        // Stop from Error leaves the error visible.
        c.stop().await;
        assert_eq!(c.session().status, RecognitionStatus::Error);
    }

    #[tokio::test]
    async fn status_changes_are_announced_on_bus() {
        let rec = Arc::new(MockRecognizer::default());
        let (c, _lock, bus) = controller(rec);
        let mut status = bus.subscribe_to(Topic::Status);

        c.start().await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..2 {
            match status.recv().await.unwrap().payload {
                EventPayload::Recognition(s) => seen.push(s.status),
                other => panic!("unexpected payload {other:?}"),
            }
        }
        assert_eq!(seen, vec![RecognitionStatus::Loading, RecognitionStatus::Listening]);
    }

    #[tokio::test]
    async fn watch_reflects_latest_session() {
        let rec = Arc::new(MockRecognizer::default());
        let (c, _lock, _bus) = controller(rec);
        let mut rx = c.watch();

        c.start().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().status, RecognitionStatus::Listening);
    }
}
