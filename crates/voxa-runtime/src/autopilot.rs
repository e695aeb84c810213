//! [`Autopilot`] – hands-free demo mode.
//!
//! Cycles `forward, left, right, backward` through the [`Dispatcher`] as
//! locally originated commands, one per period, until stopped.  Any `Stop`
//! dispatched by anyone (the operator, a remote peer) halts it as well.

use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::info;
use voxa_types::{CanonicalCommand, CommandEvent};

use crate::dispatcher::Dispatcher;

pub const AUTOPILOT_SEQUENCE: [CanonicalCommand; 4] = [
    CanonicalCommand::Forward,
    CanonicalCommand::Left,
    CanonicalCommand::Right,
    CanonicalCommand::Backward,
];

pub const DEFAULT_AUTOPILOT_PERIOD: Duration = Duration::from_millis(1200);

pub struct Autopilot {
    dispatcher: Dispatcher,
    period: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Autopilot {
    pub fn new(dispatcher: Dispatcher, period: Duration) -> Self {
        Self {
            dispatcher,
            period: period.max(Duration::from_millis(1)),
            task: Mutex::new(None),
        }
    }

    /// Begin cycling.  Returns `false` if already running.
    pub fn start(&self) -> bool {
        let mut task = self.task.lock().unwrap_or_else(|p| p.into_inner());
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return false;
        }

        // Subscribed before spawning so no Stop can slip between.
        let mut stops = self.dispatcher.stop_signal();
        let dispatcher = self.dispatcher.clone();
        let period = self.period;

        *task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            for cmd in AUTOPILOT_SEQUENCE.iter().cycle() {
                tokio::select! {
                    _ = ticker.tick() => {
                        dispatcher.dispatch(CommandEvent::local(*cmd, 1.0));
                    }
                    _ = stops.changed() => break,
                }
            }
            info!("autopilot halted by stop command");
        }));
        info!(period_ms = period.as_millis() as u64, "autopilot engaged");
        true
    }

    /// Stop cycling.  Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        let task = self.task.lock().unwrap_or_else(|p| p.into_inner()).take();
        match task {
            Some(t) if !t.is_finished() => {
                t.abort();
                info!("autopilot disengaged");
                true
            }
            _ => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Autopilot {
    fn drop(&mut self) {
        self.stop();
    }
}
