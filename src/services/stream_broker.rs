//! Stream Broker: single-process pub/sub over the event log.
//!
//! State lives behind a single `Mutex` guarding the subscriber map; `publish`
//! snapshots matching subscribers under the lock, then enqueues outside it so
//! a slow receiver never blocks the publisher. Each subscriber queue is
//! bounded; a full queue drops its oldest entry to make room for the new one.

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use crate::domain::models::Event;

const QUEUE_CAPACITY: usize = 200;

struct Subscriber {
    recipient_id: Option<Uuid>,
    channel: Option<String>,
    include_broadcast: bool,
    queue: std::collections::VecDeque<Event>,
}

impl Subscriber {
    fn matches(&self, event: &Event) -> bool {
        if let Some(ref channel) = self.channel {
            if &event.channel != channel {
                return false;
            }
        }
        if let Some(recipient_id) = self.recipient_id {
            let direct_match = event.recipient_id == Some(recipient_id);
            let broadcast_match = self.include_broadcast && event.recipient_id.is_none();
            if !direct_match && !broadcast_match {
                return false;
            }
        }
        true
    }

    fn enqueue(&mut self, event: Event) {
        if self.queue.len() >= QUEUE_CAPACITY {
            self.queue.pop_front();
        }
        self.queue.push_back(event);
    }
}

/// Handle returned from `subscribe`. Drop it (or call `unsubscribe`) to stop
/// receiving events.
pub struct SubscriptionHandle {
    pub subscriber_id: Uuid,
}

#[derive(Default)]
pub struct StreamBroker {
    subscribers: Mutex<HashMap<Uuid, Subscriber>>,
    activity: tokio::sync::Notify,
}

impl StreamBroker {
    pub fn new() -> Self {
        Self { subscribers: Mutex::new(HashMap::new()), activity: tokio::sync::Notify::new() }
    }

    /// Resolves on the next `publish` call, or immediately if one happened
    /// since the last await. Used by `OrchestratorRuntime`'s wakeup loop,
    /// which subscribes to channel `orchestration` and otherwise falls back
    /// to its fixed poll interval.
    pub async fn notified(&self) {
        self.activity.notified().await;
    }

    pub fn subscribe(&self, recipient_id: Option<Uuid>, channel: Option<String>, include_broadcast: bool) -> SubscriptionHandle {
        let subscriber_id = Uuid::new_v4();
        let subscriber = Subscriber {
            recipient_id,
            channel,
            include_broadcast,
            queue: std::collections::VecDeque::with_capacity(QUEUE_CAPACITY),
        };
        self.subscribers.lock().unwrap().insert(subscriber_id, subscriber);
        SubscriptionHandle { subscriber_id }
    }

    pub fn unsubscribe(&self, subscriber_id: Uuid) {
        self.subscribers.lock().unwrap().remove(&subscriber_id);
    }

    /// Deliver `event` to every currently-matching subscriber.
    pub fn publish(&self, event: &Event) {
        let mut subscribers = self.subscribers.lock().unwrap();
        for subscriber in subscribers.values_mut() {
            if subscriber.matches(event) {
                subscriber.enqueue(event.clone());
            }
        }
        drop(subscribers);
        self.activity.notify_waiters();
    }

    /// Drain everything currently queued for `subscriber_id`, oldest first.
    pub fn drain(&self, subscriber_id: Uuid) -> Vec<Event> {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers
            .get_mut(&subscriber_id)
            .map(|s| s.queue.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}
