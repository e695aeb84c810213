//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.  A slow reader (the cockpit on a bad network) lags and loses
//! old events; it never stalls the ticker or the dispatcher.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Commands`] | Every dispatched [`CommandEvent`][voxa_types::CommandEvent] |
//! | [`Topic::Motion`] | High-frequency [`MotionSnapshot`][voxa_types::MotionSnapshot]s from the ticker |
//! | [`Topic::Status`] | Recognition lifecycle and remote link changes |
//! | [`Topic::Alerts`] | Non-fatal faults (failed remote publish, recognizer errors) |

use tokio::sync::broadcast;
use voxa_types::{Event, VoxaError};

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Enumeration of all routing topics on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Commands,
    Motion,
    Status,
    Alerts,
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    commands: broadcast::Sender<Event>,
    motion: broadcast::Sender<Event>,
    status: broadcast::Sender<Event>,
    alerts: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (commands, _) = broadcast::channel(capacity);
        let (motion, _) = broadcast::channel(capacity);
        let (status, _) = broadcast::channel(capacity);
        let (alerts, _) = broadcast::channel(capacity);
        Self {
            commands,
            motion,
            status,
            alerts,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event, or
    /// [`VoxaError::Channel`] when nobody is listening on the topic.  Most
    /// producers treat that as a normal condition and ignore it.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, VoxaError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| VoxaError::Channel(format!("No subscribers for topic {topic:?}")))
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of live receivers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Commands => &self.commands,
            Topic::Motion => &self.motion,
            Topic::Status => &self.status,
            Topic::Alerts => &self.alerts,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use voxa_types::{CanonicalCommand, CommandEvent, EventPayload};

    fn make_event(source: &str) -> Event {
        Event::new(
            source,
            EventPayload::Command(CommandEvent::local(CanonicalCommand::Left, 0.9)),
        )
    }

    #[test]
    fn publish_without_subscribers_is_channel_error() {
        let bus = EventBus::default();
        let result = bus.publish_to(Topic::Commands, make_event("test"));
        assert!(matches!(result, Err(VoxaError::Channel(_))));
    }

    #[tokio::test]
    async fn topic_multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut subscriber1 = bus.subscribe_to(Topic::Commands);
        let mut subscriber2 = bus.subscribe_to(Topic::Commands);

        let event = make_event("voxa-runtime::dispatcher");
        assert_eq!(bus.publish_to(Topic::Commands, event.clone())?, 2);

        assert_eq!(subscriber1.recv().await?.id, event.id);
        assert_eq!(subscriber2.recv().await?.id, event.id);
        Ok(())
    }

    /// Topics are separate channels; an Alerts subscriber never sees Motion.
    #[tokio::test]
    async fn topic_subscriber_does_not_receive_other_topic_events() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut alerts_sub = bus.subscribe_to(Topic::Alerts);
        let _motion_sub = bus.subscribe_to(Topic::Motion);

        bus.publish_to(Topic::Motion, make_event("voxa-runtime::ticker"))?;

        let result = tokio::time::timeout(Duration::from_millis(50), alerts_sub.recv()).await;
        assert!(result.is_err(), "Alerts subscriber must not receive a Motion event");
        assert_eq!(alerts_sub.topic(), Topic::Alerts);
        Ok(())
    }

    #[tokio::test]
    async fn topic_channel_lag_on_slow_subscriber() {
        let bus = EventBus::new(64);
        let mut slow_sub = bus.subscribe_to(Topic::Motion);

        for _ in 0..1_000 {
            let _ = bus.publish_to(Topic::Motion, make_event("flood::motion"));
        }

        let result = slow_sub.recv().await;
        assert!(
            matches!(result, Err(broadcast::error::RecvError::Lagged(_))),
            "expected Lagged error, got: {result:?}"
        );
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(Topic::Status), 0);
        let rx = bus.subscribe_to(Topic::Status);
        assert_eq!(bus.subscriber_count(Topic::Status), 1);
        drop(rx);
        assert_eq!(bus.subscriber_count(Topic::Status), 0);
    }
}
