//! Typed Event Bus: ordered in-process fan-out of outbound events to
//! subscribers.
//!
//! Unlike a conventional pub/sub bus, every subscriber is invoked
//! synchronously, in registration order, within the call to `publish`. The
//! processor itself never awaits, so there is nothing to spawn or buffer; a
//! bounded broadcast channel or background task would only hide ordering
//! bugs the specification explicitly rules out. A subscriber that panics is
//! caught and logged rather than allowed to take down delivery to the
//! subscribers registered after it.

use crate::events::Severity;
use crate::model::{MediaItem, Message, Session, ToolCall, ToolNotification, ToolResult, Vendor};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The events the processor publishes. Payloads mirror the external
/// interface contract field-for-field; `SystemMessage` and `Error` retain
/// every field from the inbound event they re-publish.
#[derive(Debug, Clone)]
pub enum OutboundEvent {
    MessageStreaming { session_id: String, message: Message },
    MessageComplete { session_id: String, message: Message },
    MessageAdded { session_id: String, message: Message },
    MessageUpdated {
        session_id: String,
        message_id: String,
        message: Message,
    },
    SessionMessagesLoaded {
        session_id: String,
        messages: Vec<Message>,
    },
    ToolNotification { notification: ToolNotification },
    ToolNotificationRemoved { session_id: String, tool_call_id: String },
    ToolCallComplete {
        tool_calls: Vec<ToolCall>,
        tool_results: Vec<ToolResult>,
    },
    MediaAdded { session_id: String, media: MediaItem },
    SystemMessage {
        session_id: String,
        role: String,
        content: String,
        format: crate::model::MessageFormat,
        severity: Severity,
        parent_session_id: Option<String>,
        user_session_id: Option<String>,
    },
    /// Toast-style, never chat content.
    Error {
        message: String,
        source: Option<String>,
        timestamp: String,
    },
    SubsessionStarted {
        sub_session_type: String,
        sub_agent_type: String,
        prime_agent_key: Option<String>,
        sub_agent_key: Option<String>,
    },
    SubsessionEnded,
    ResponseCancelled,
    /// Raw backward-compatibility event alongside `MessageAdded`.
    UserMessage { vendor: Vendor, message: Message },
    SessionsUpdated { sessions: Vec<Session> },
}

pub type SubscriberToken = u64;

/// Receives events published on an [`EventBus`]. Implemented as a plain
/// synchronous callback rather than an async trait: the bus never awaits a
/// subscriber, it just calls it.
pub trait EventSubscriber: Send + Sync {
    fn on_event(&self, event: &OutboundEvent);
}

impl<F> EventSubscriber for F
where
    F: Fn(&OutboundEvent) + Send + Sync,
{
    fn on_event(&self, event: &OutboundEvent) {
        self(event)
    }
}

type SubscriberList = Vec<(SubscriberToken, Arc<dyn EventSubscriber>)>;

/// Ordered, synchronous fan-out of [`OutboundEvent`]s.
pub struct EventBus {
    subscribers: Mutex<SubscriberList>,
    next_token: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Register a subscriber, returning a token usable with
    /// [`EventBus::unsubscribe`].
    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) -> SubscriberToken {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push((token, subscriber));
        token
    }

    /// Remove a previously registered subscriber. Returns `false` if the
    /// token was not found (already removed, or never valid).
    pub fn unsubscribe(&self, token: SubscriberToken) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(t, _)| *t != token);
        before != subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Deliver `event` to every subscriber, in registration order, within
    /// this call. A subscriber must not call back into the processor from
    /// `on_event` — reentrant delivery has undefined ordering.
    pub fn publish(&self, event: OutboundEvent) {
        // Snapshot the list before dispatch so a subscriber that
        // subscribes/unsubscribes during delivery doesn't reorder or skip
        // entries mid-iteration.
        let subscribers: Vec<_> = self.subscribers.lock().iter().map(|(_, s)| Arc::clone(s)).collect();
        for subscriber in subscribers {
            let result = panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_event(&event)));
            if let Err(payload) = result {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                log::error!("event bus subscriber panicked: {message}");
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MessageContent, MessageFormat, Role};
    use std::sync::Mutex as StdMutex;

    fn sample_message() -> Message {
        Message::new(Role::Assistant, MessageContent::text("hi"), MessageFormat::Text)
    }

    struct RecordingSubscriber {
        received: StdMutex<Vec<String>>,
    }

    impl RecordingSubscriber {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                received: StdMutex::new(Vec::new()),
            })
        }

        fn labels(&self) -> Vec<String> {
            self.received.lock().unwrap().clone()
        }
    }

    impl EventSubscriber for RecordingSubscriber {
        fn on_event(&self, event: &OutboundEvent) {
            let label = match event {
                OutboundEvent::MessageStreaming { .. } => "message-streaming",
                OutboundEvent::MessageComplete { .. } => "message-complete",
                OutboundEvent::ResponseCancelled => "response-cancelled",
                _ => "other",
            };
            self.received.lock().unwrap().push(label.to_string());
        }
    }

    #[test]
    fn subscribers_are_notified_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(StdMutex::new(Vec::new()));

        let order_a = order.clone();
        let token_a = bus.subscribe(Arc::new(move |_: &OutboundEvent| {
            order_a.lock().unwrap().push("a");
        }));
        let order_b = order.clone();
        bus.subscribe(Arc::new(move |_: &OutboundEvent| {
            order_b.lock().unwrap().push("b");
        }));

        bus.publish(OutboundEvent::ResponseCancelled);
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);

        assert!(bus.unsubscribe(token_a));
        order.lock().unwrap().clear();
        bus.publish(OutboundEvent::ResponseCancelled);
        assert_eq!(*order.lock().unwrap(), vec!["b"]);
    }

    #[test]
    fn unsubscribe_unknown_token_returns_false() {
        let bus = EventBus::new();
        assert!(!bus.unsubscribe(999));
    }

    #[test]
    fn subscriber_count_reflects_registrations() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        let token = bus.subscribe(RecordingSubscriber::new());
        assert_eq!(bus.subscriber_count(), 1);
        bus.unsubscribe(token);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn panicking_subscriber_does_not_block_later_subscribers() {
        let bus = EventBus::new();
        bus.subscribe(Arc::new(|_: &OutboundEvent| panic!("boom")));
        let good = RecordingSubscriber::new();
        bus.subscribe(good.clone());

        bus.publish(OutboundEvent::MessageStreaming {
            session_id: "s1".into(),
            message: sample_message(),
        });

        assert_eq!(good.labels(), vec!["message-streaming"]);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(OutboundEvent::ResponseCancelled);
    }

    #[test]
    fn default_creates_an_empty_bus() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(), 0);
    }
}
