//! [`Session`] – everything one operator session owns.
//!
//! `Session::start` wires the pieces together and spawns four tasks:
//!
//! | Task | Does |
//! |---|---|
//! | publisher | drains the outbox into [`RemoteSync::publish`] |
//! | ticker | advances motion at `tick_hz` by elapsed time, publishes a [`MotionSnapshot`] on [`Topic::Motion`], reports remote link changes |
//! | remote pump | normalizes raw remote payloads and dispatches them as [`Origin::Remote`] |
//! | recognition pump | gates raw hypotheses and dispatches admitted ones as [`Origin::Local`] |
//!
//! Nothing is global.  Two sessions in one process are fully independent,
//! which is how the tests run a pair of peers over a shared register.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info, trace, warn};
use voxa_kernel::{CONFIDENCE_THRESHOLD, ConfidenceGate, PowerLock};
use voxa_middleware::{EventBus, Recognizer, RemoteSubscription, RemoteSync, Topic};
use voxa_motion::{MotionConfig, MotionHandle};
use voxa_types::{
    CanonicalCommand, CommandEvent, Event, EventPayload, Hypothesis, MotionSnapshot, Origin,
    RecognitionSession, RecognitionStatus, VoxaError,
};

use crate::autopilot::{Autopilot, DEFAULT_AUTOPILOT_PERIOD};
use crate::dispatcher::{DispatchOutcome, Dispatcher, Outbox, Publisher};
use crate::recognition::RecognitionController;

const SOURCE: &str = "voxa-runtime::session";

/// Configuration bundle for [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub motion: MotionConfig,
    /// Minimum recognizer confidence admitted to the dispatcher.
    pub confidence_threshold: f32,
    /// Smoothing ticks per second.
    pub tick_hz: u32,
    pub autopilot_period: Duration,
    pub bus_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            motion: MotionConfig::default(),
            confidence_threshold: CONFIDENCE_THRESHOLD,
            tick_hz: 60,
            autopilot_period: DEFAULT_AUTOPILOT_PERIOD,
            bus_capacity: 256,
        }
    }
}

pub struct Session {
    bus: EventBus,
    dispatcher: Dispatcher,
    recognition: Arc<RecognitionController>,
    autopilot: Autopilot,
    remote: Arc<dyn RemoteSync>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Build and start a session.  Must be called inside a Tokio runtime.
    pub fn start(
        config: SessionConfig,
        remote: Arc<dyn RemoteSync>,
        recognizer: Arc<dyn Recognizer>,
        power: Arc<dyn PowerLock>,
    ) -> Self {
        let bus = EventBus::new(config.bus_capacity.max(1));
        let motion = MotionHandle::new(config.motion.clone());

        let (outbox, outbox_rx) = Outbox::channel();
        let dispatcher = Dispatcher::new(motion.clone(), outbox, bus.clone());
        let publisher = Publisher::new(Arc::clone(&remote), bus.clone()).spawn(outbox_rx);

        let (recognition, hypotheses) = RecognitionController::new(recognizer, power, bus.clone());
        let recognition = Arc::new(recognition);

        let gate = ConfidenceGate::new(config.confidence_threshold);
        let ticker = tokio::spawn(run_ticker(
            motion,
            bus.clone(),
            Arc::clone(&remote),
            config.tick_hz,
        ));
        // Subscribed here, not in the task, so nothing written after `start`
        // returns can be missed.
        let remote_pump = tokio::spawn(run_remote_pump(dispatcher.clone(), remote.subscribe()));
        let recognition_pump = tokio::spawn(run_recognition_pump(
            dispatcher.clone(),
            gate,
            recognition.watch(),
            hypotheses,
        ));

        let autopilot = Autopilot::new(dispatcher.clone(), config.autopilot_period);

        info!(
            remote_connected = remote.is_connected(),
            tick_hz = config.tick_hz,
            threshold = config.confidence_threshold,
            "session started"
        );

        Self {
            bus,
            dispatcher,
            recognition,
            autopilot,
            remote,
            tasks: vec![publisher, ticker, remote_pump, recognition_pump],
        }
    }

    // ── Recognition ───────────────────────────────────────────────────────────

    pub async fn start_listening(&self) -> Result<(), VoxaError> {
        self.recognition.start().await
    }

    pub async fn stop_listening(&self) {
        self.recognition.stop().await
    }

    /// Report that the running engine died.
    pub async fn recognition_failed(&self, message: impl Into<String>) {
        self.recognition.fail(message).await
    }

    pub fn recognition(&self) -> RecognitionSession {
        self.recognition.session()
    }

    pub fn watch_recognition(&self) -> watch::Receiver<RecognitionSession> {
        self.recognition.watch()
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    /// Dispatch a locally originated `Stop`.  Halts the autopilot, leaves the
    /// target where it is and is mirrored to the remote peer.
    pub fn halt(&self) -> DispatchOutcome {
        self.dispatcher
            .dispatch(CommandEvent::local(CanonicalCommand::Stop, 1.0))
    }

    pub fn start_autopilot(&self) -> bool {
        self.autopilot.start()
    }

    pub fn stop_autopilot(&self) -> bool {
        self.autopilot.stop()
    }

    pub fn autopilot_running(&self) -> bool {
        self.autopilot.is_running()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    // ── Presentation ──────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> MotionSnapshot {
        self.dispatcher.motion().snapshot()
    }

    pub fn last_command(&self) -> Option<CommandEvent> {
        self.dispatcher.last_command()
    }

    pub fn watch_last_command(&self) -> watch::Receiver<Option<CommandEvent>> {
        self.dispatcher.watch_last()
    }

    pub fn remote_connected(&self) -> bool {
        self.remote.is_connected()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Stop recognition and the autopilot, end the remote subscription and
    /// stop every task.
    pub async fn shutdown(self) {
        self.recognition.shutdown().await;
        self.autopilot.stop();
        info!("session shut down");
        // Drop aborts the tasks; the remote pump owns the subscription.
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tasks
// ─────────────────────────────────────────────────────────────────────────────

async fn run_ticker(motion: MotionHandle, bus: EventBus, remote: Arc<dyn RemoteSync>, tick_hz: u32) {
    let mut ticker = interval(Duration::from_secs_f64(1.0 / f64::from(tick_hz.max(1))));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last = Instant::now();
    let mut linked = remote.is_connected();
    announce_link(&bus, linked);

    loop {
        ticker.tick().await;
        let now = Instant::now();
        let snapshot = motion.advance_for(now - last);
        last = now;
        let _ = bus.publish_to(
            Topic::Motion,
            Event::new("voxa-runtime::ticker", EventPayload::Motion(snapshot)),
        );

        let connected = remote.is_connected();
        if connected != linked {
            linked = connected;
            if connected {
                info!("remote link up");
            } else {
                warn!("remote link lost; continuing local-only");
            }
            announce_link(&bus, connected);
        }
    }
}

fn announce_link(bus: &EventBus, connected: bool) {
    let _ = bus.publish_to(
        Topic::Status,
        Event::new(SOURCE, EventPayload::RemoteLink { connected }),
    );
}

async fn run_remote_pump(dispatcher: Dispatcher, mut subscription: RemoteSubscription) {
    while let Some(raw) = subscription.recv().await {
        if dispatcher.dispatch_raw(&raw, Origin::Remote, 1.0).is_none() {
            debug!(raw = %raw, "ignored remote payload");
        }
    }
    debug!("remote subscription ended");
}

/// Hypotheses still queued when the recognizer leaves `Listening` are dropped.
async fn run_recognition_pump(
    dispatcher: Dispatcher,
    gate: ConfidenceGate,
    status: watch::Receiver<RecognitionSession>,
    mut hypotheses: mpsc::Receiver<Hypothesis>,
) {
    while let Some(hypothesis) = hypotheses.recv().await {
        let listening = status.borrow().status == RecognitionStatus::Listening;
        if !listening {
            trace!(label = %hypothesis.label, "hypothesis after recognizer stopped");
            continue;
        }
        match gate.admit(&hypothesis) {
            Some(cmd) => {
                dispatcher.dispatch(CommandEvent::local(cmd, hypothesis.confidence));
            }
            None => trace!(
                label = %hypothesis.label,
                confidence = hypothesis.confidence,
                "hypothesis below gate"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimRecognizer;
    use tokio::time::{sleep, timeout};
    use voxa_kernel::TracingPowerLock;
    use voxa_middleware::{LocalOnly, RegisterRemote, SharedRegister};
    use voxa_types::Vec3;

    struct Peer {
        session: Session,
        sim: Arc<SimRecognizer>,
        lock: Arc<TracingPowerLock>,
    }

    fn peer(remote: Arc<dyn RemoteSync>) -> Peer {
        let sim = Arc::new(SimRecognizer::new());
        let lock = Arc::new(TracingPowerLock::default());
        let session = Session::start(SessionConfig::default(), remote, sim.clone(), lock.clone());
        Peer { session, sim, lock }
    }

    async fn eventually(mut cond: impl FnMut() -> bool) {
        timeout(Duration::from_secs(2), async {
            while !cond() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not met in time");
    }

    fn target(p: &Peer) -> Vec3 {
        p.session.snapshot().target_position
    }

    #[tokio::test]
    async fn spoken_command_moves_both_peers_without_echo() {
        let register = SharedRegister::new();
        let remote_a: RegisterRemote = register.peer();
        let writer_a = remote_a.writer_id();
        let a = peer(Arc::new(remote_a));
        let b = peer(Arc::new(register.peer()));

        a.session.start_listening().await.unwrap();
        assert!(a.sim.feed("right", 0.9).await);

        eventually(|| (target(&a).x - 0.28).abs() < 1e-6).await;
        eventually(|| (target(&b).x - 0.28).abs() < 1e-6).await;

        let last_b = b.session.last_command().unwrap();
        assert_eq!(last_b.origin, Origin::Remote);
        assert_eq!(last_b.command, CanonicalCommand::Right);

        // B never wrote back, and A never re-applied its own write.
        sleep(Duration::from_millis(50)).await;
        let latest = register.latest().unwrap();
        assert_eq!(latest.writer, writer_a);
        assert_eq!(latest.seq, 1);
        assert_eq!(target(&a), Vec3::new(0.28, 1.4, 0.0));
    }

    #[tokio::test]
    async fn low_confidence_never_reaches_dispatcher() {
        let p = peer(Arc::new(LocalOnly));
        p.session.start_listening().await.unwrap();

        assert!(p.sim.feed("right", 0.5).await);
        assert!(p.sim.feed("banana", 0.99).await);
        sleep(Duration::from_millis(50)).await;

        assert_eq!(p.session.last_command(), None);
        assert_eq!(target(&p).x, 0.0);
    }

    #[tokio::test]
    async fn listening_holds_power_lock_until_shutdown() {
        let p = peer(Arc::new(LocalOnly));
        p.session.start_listening().await.unwrap();
        assert_eq!(p.session.recognition().status, RecognitionStatus::Listening);
        assert!(p.lock.is_held());

        let lock = p.lock.clone();
        p.session.shutdown().await;
        assert!(!lock.is_held());
    }

    #[tokio::test]
    async fn unavailable_recognizer_leaves_motion_usable() {
        let p = peer(Arc::new(LocalOnly));
        p.sim.set_available(false);

        assert!(matches!(
            p.session.start_listening().await,
            Err(VoxaError::RecognizerUnavailable(_))
        ));
        assert_eq!(p.session.recognition().status, RecognitionStatus::Error);

        p.session
            .dispatcher()
            .dispatch(CommandEvent::local(CanonicalCommand::Up, 1.0));
        assert!(target(&p).y > 1.4);
    }

    #[tokio::test]
    async fn ticker_streams_converging_snapshots() {
        let p = peer(Arc::new(LocalOnly));
        let mut motion = p.session.bus().subscribe_to(Topic::Motion);
        p.session
            .dispatcher()
            .dispatch(CommandEvent::local(CanonicalCommand::Left, 1.0));

        let first = match timeout(Duration::from_secs(1), motion.recv()).await.unwrap().unwrap().payload {
            EventPayload::Motion(s) => s,
            other => panic!("unexpected payload {other:?}"),
        };
        sleep(Duration::from_millis(200)).await;
        let later = p.session.snapshot();

        assert!(first.current_position.x <= 0.0);
        assert!(later.current_position.x < first.current_position.x);
        assert!(later.current_position.x > -0.28);
    }

    #[tokio::test]
    async fn halt_stops_autopilot_and_keeps_target() {
        let p = peer(Arc::new(LocalOnly));
        assert!(p.session.start_autopilot());
        let before = target(&p);

        let outcome = p.session.halt();
        assert!(!outcome.target_changed);
        eventually(|| !p.session.autopilot_running()).await;
        assert_eq!(target(&p), before);
        assert!(!p.session.remote_connected());
    }

    #[tokio::test]
    async fn queued_hypotheses_are_dropped_once_not_listening() {
        let (outbox, _published) = Outbox::channel();
        let dispatcher = Dispatcher::new(MotionHandle::default(), outbox, EventBus::new(16));
        let gate = ConfidenceGate::new(CONFIDENCE_THRESHOLD);
        let (status, _) = watch::channel(RecognitionSession::default());

        // Buffered while listening, drained after the recognizer went Idle.
        let (tx, rx) = mpsc::channel(4);
        tx.send(Hypothesis::new("left", 0.99)).await.unwrap();
        drop(tx);
        run_recognition_pump(dispatcher.clone(), gate.clone(), status.subscribe(), rx).await;
        assert!(dispatcher.last_command().is_none());
        assert_eq!(dispatcher.motion().snapshot().target_position.x, 0.0);

        status.send_replace(RecognitionSession {
            status: RecognitionStatus::Listening,
            last_error: None,
        });
        let (tx, rx) = mpsc::channel(4);
        tx.send(Hypothesis::new("left", 0.99)).await.unwrap();
        drop(tx);
        run_recognition_pump(dispatcher.clone(), gate, status.subscribe(), rx).await;
        assert_eq!(dispatcher.last_command().unwrap().command, CanonicalCommand::Left);
    }
}
