#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! In-process event bus for course edit notifications.
//!
//! # Design
//! - `tokio::broadcast` fan-out with a bounded replay ring so late subscribers can
//!   catch up from a known event id.
//! - Publishing never blocks and never fails; with no subscribers the event is only
//!   retained in the replay ring.
//! - A poisoned replay mutex is recovered rather than propagated.

pub mod payloads;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::broadcast::{self, Receiver, Sender};

pub use payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId};

/// Shared event bus built on top of `tokio::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    buffer: Arc<Mutex<VecDeque<EventEnvelope>>>,
    next_id: Arc<AtomicU64>,
    replay_capacity: usize,
}

impl EventBus {
    /// Construct a new bus with the provided broadcast and replay capacity.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            next_id: Arc::new(AtomicU64::new(1)),
            replay_capacity: capacity,
        }
    }

    /// Construct a bus with the default replay capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish an event, assigning it the next sequential identifier.
    pub fn publish(&self, event: Event) -> EventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };

        {
            let mut buffer = self.lock_buffer();
            if buffer.len() == self.replay_capacity {
                buffer.pop_front();
            }
            buffer.push_back(envelope.clone());
        }

        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe to the bus, replaying buffered events newer than `since_id`.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        let mut backlog = VecDeque::new();
        if let Some(since) = since_id {
            let buffer = self.lock_buffer();
            backlog.extend(buffer.iter().filter(|item| item.id > since).cloned());
        }

        EventStream {
            backlog,
            receiver: self.sender.subscribe(),
        }
    }

    /// Returns the last assigned identifier, if any events have been published.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        self.lock_buffer().back().map(|event| event.id)
    }

    /// Snapshot of the events currently retained for replay.
    #[must_use]
    pub fn backlog(&self) -> Vec<EventEnvelope> {
        self.lock_buffer().iter().cloned().collect()
    }

    fn lock_buffer(&self) -> MutexGuard<'_, VecDeque<EventEnvelope>> {
        match self.buffer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream yielding events from the replay backlog first, then the live channel.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
}

impl EventStream {
    /// Receive the next event, or `None` once the bus is dropped.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }

        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;
    use uuid::Uuid;

    fn progress(step: &str) -> Event {
        Event::EditProgress {
            course_id: "course-1".to_string(),
            sequence_id: Uuid::nil(),
            step: step.to_string(),
        }
    }

    #[tokio::test]
    async fn sequential_ids_and_replay() {
        let bus = EventBus::with_capacity(16);

        let mut last_id = 0;
        for step in ["lock", "write", "unlock", "sync_from_disk", "finish"] {
            last_id = bus.publish(progress(step));
        }
        assert_eq!(last_id, 5);

        let mut stream = bus.subscribe(Some(2));
        let mut received = Vec::new();
        for _ in 0..3 {
            if let Some(event) = stream.next().await {
                received.push(event);
            }
        }

        let ids: Vec<EventId> = received.iter().map(|event| event.id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
        assert_eq!(received[0].event, progress("unlock"));
    }

    #[test]
    fn replay_ring_drops_oldest_entries() {
        let bus = EventBus::with_capacity(2);
        let _ = bus.publish(progress("lock"));
        let _ = bus.publish(progress("write"));
        let _ = bus.publish(progress("unlock"));

        let backlog = bus.backlog();
        assert_eq!(backlog.len(), 2);
        assert_eq!(backlog[0].id, 2);
        assert_eq!(bus.last_event_id(), Some(3));
    }

    #[tokio::test]
    async fn live_subscribers_receive_new_events() {
        let bus = EventBus::new();
        let mut stream = bus.subscribe(None);
        let id = bus.publish(Event::HealthChanged {
            degraded: vec!["edit_pipeline".to_string()],
        });

        let received = timeout(Duration::from_secs(1), stream.next()).await;
        let envelope = received.ok().flatten();
        assert_eq!(envelope.map(|item| item.id), Some(id));
    }
}
