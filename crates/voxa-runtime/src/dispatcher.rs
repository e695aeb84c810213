//! [`Dispatcher`] – the command core.
//!
//! Every canonical command, whatever its source, goes through
//! [`Dispatcher::dispatch`]:
//!
//! 1. **Apply** – the shared [`MotionHandle`] target is nudged.  Local and
//!    remote commands drive the same state; the last one wins.
//! 2. **Echo guard** – only [`Origin::Local`] commands are queued for the
//!    remote channel.  A remote command is never re-published, otherwise two
//!    peers sharing a register would bounce it back and forth forever.
//! 3. **Observe** – the last-command watch channel is updated and a
//!    [`EventPayload::Command`] event goes out on [`Topic::Commands`].
//!
//! Publishing never blocks dispatch.  Local commands are pushed into an
//! [`Outbox`] and a separate [`Publisher`] task awaits
//! [`RemoteSync::publish`].  A failed publish is logged and raised on
//! [`Topic::Alerts`]; the motion change it belonged to is kept.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use voxa_kernel::normalize;
use voxa_middleware::{EventBus, RemoteSync, Topic};
use voxa_motion::MotionHandle;
use voxa_types::{CanonicalCommand, CommandEvent, Event, EventPayload, Origin};

const SOURCE: &str = "voxa-runtime::dispatcher";

/// What a single dispatch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// The motion target moved (false for `Stop` and for clamped moves).
    pub target_changed: bool,
    /// The command was queued for the remote channel.
    pub published: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbox / Publisher
// ─────────────────────────────────────────────────────────────────────────────

/// Sending half of the publish queue.  Never blocks.
#[derive(Clone, Debug)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<CanonicalCommand>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CanonicalCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue `cmd`; `false` once the publisher is gone.
    pub fn push(&self, cmd: CanonicalCommand) -> bool {
        self.tx.send(cmd).is_ok()
    }
}

/// Drains an [`Outbox`] into a [`RemoteSync`].
pub struct Publisher {
    remote: Arc<dyn RemoteSync>,
    bus: EventBus,
}

impl Publisher {
    pub fn new(remote: Arc<dyn RemoteSync>, bus: EventBus) -> Self {
        Self { remote, bus }
    }

    pub fn spawn(self, rx: mpsc::UnboundedReceiver<CanonicalCommand>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    /// Publish queued commands in order until every [`Outbox`] is dropped.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<CanonicalCommand>) {
        while let Some(cmd) = rx.recv().await {
            match self.remote.publish(cmd).await {
                Ok(()) => debug!(command = %cmd, "published to remote"),
                Err(e) => {
                    warn!(command = %cmd, error = %e, "remote publish failed");
                    let _ = self.bus.publish_to(
                        Topic::Alerts,
                        Event::new(
                            "voxa-runtime::publisher",
                            EventPayload::Fault {
                                component: "remote".to_string(),
                                message: e.to_string(),
                            },
                        ),
                    );
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// Cheaply cloneable; clones share motion state, outbox and observers.
#[derive(Clone)]
pub struct Dispatcher {
    motion: MotionHandle,
    outbox: Outbox,
    bus: EventBus,
    last: Arc<watch::Sender<Option<CommandEvent>>>,
    // Bumped on every dispatched Stop; the autopilot watches it.
    stops: Arc<watch::Sender<u64>>,
}

impl Dispatcher {
    pub fn new(motion: MotionHandle, outbox: Outbox, bus: EventBus) -> Self {
        let (last, _) = watch::channel(None);
        let (stops, _) = watch::channel(0);
        Self {
            motion,
            outbox,
            bus,
            last: Arc::new(last),
            stops: Arc::new(stops),
        }
    }

    pub fn dispatch(&self, event: CommandEvent) -> DispatchOutcome {
        let cmd = event.command;
        let target_changed = self.motion.apply_command(cmd);

        if cmd == CanonicalCommand::Stop {
            self.stops.send_modify(|n| *n += 1);
        }

        let published = match event.origin {
            Origin::Local => {
                let queued = self.outbox.push(cmd);
                if !queued {
                    warn!(command = %cmd, "publisher stopped; command not sent");
                }
                queued
            }
            Origin::Remote => false,
        };

        debug!(
            command = %cmd,
            origin = ?event.origin,
            confidence = event.confidence,
            target_changed,
            published,
            "dispatched"
        );

        self.last.send_replace(Some(event.clone()));
        // Nobody watching the Commands topic is fine.
        let _ = self
            .bus
            .publish_to(Topic::Commands, Event::new(SOURCE, EventPayload::Command(event)));

        DispatchOutcome {
            target_changed,
            published,
        }
    }

    /// Normalize `raw` and dispatch it.  Unrecognized input is dropped and
    /// returns `None`.
    pub fn dispatch_raw(&self, raw: &str, origin: Origin, confidence: f32) -> Option<DispatchOutcome> {
        let Some(cmd) = normalize(raw) else {
            debug!(raw = %raw, origin = ?origin, "dropping unrecognized input");
            return None;
        };
        let event = match origin {
            Origin::Local => CommandEvent::local(cmd, confidence),
            Origin::Remote => CommandEvent::remote(cmd),
        };
        Some(self.dispatch(event))
    }

    pub fn last_command(&self) -> Option<CommandEvent> {
        self.last.borrow().clone()
    }

    pub fn watch_last(&self) -> watch::Receiver<Option<CommandEvent>> {
        self.last.subscribe()
    }

    pub fn stop_signal(&self) -> watch::Receiver<u64> {
        self.stops.subscribe()
    }

    pub fn motion(&self) -> &MotionHandle {
        &self.motion
    }
}
