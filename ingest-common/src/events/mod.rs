//! Event types for the ingest synchronization event system
//!
//! Provides the shared event definitions and the EventBus the presentation
//! side subscribes to.

mod session_types;

pub use session_types::{CounterClass, SessionResult, SessionState};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Synchronization events
///
/// Emitted by the sync engine whenever the local session model changes or
/// the presentation side must react (degraded display, navigation).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncEvent {
    /// Server-reported session state changed
    SessionStateChanged {
        /// State before the change
        old_state: SessionState,
        /// State after the change
        new_state: SessionState,
        timestamp: DateTime<Utc>,
    },

    /// Status poll failed; display "no data" until the next good poll
    StatusUnavailable {
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Item list replaced or locally transformed
    ItemsChanged {
        item_count: usize,
        /// Item-order counter after the change
        counter: i64,
        timestamp: DateTime<Utc>,
    },

    /// Clip marks refreshed from the server
    ClipMarksChanged {
        counter: i64,
        timestamp: DateTime<Utc>,
    },

    /// Session comments refreshed or saved
    CommentsChanged {
        counter: i64,
        timestamp: DateTime<Utc>,
    },

    /// Cache contents refreshed
    CacheChanged {
        entry_count: usize,
        counter: i64,
        timestamp: DateTime<Utc>,
    },

    /// A counter was invalidated; the next poll performs a full reload
    ReloadRequired {
        class: CounterClass,
        timestamp: DateTime<Utc>,
    },

    /// Recording finished; switch to the review view
    NavigateToReview { timestamp: DateTime<Utc> },

    /// Pending comments were sent on the recording-finished edge
    CommentsFlushed { ok: bool, timestamp: DateTime<Utc> },

    /// Result of the last session, published on entering NOT_STARTED
    /// (`None` once the state leaves NOT_STARTED)
    LastSessionResult {
        result: Option<SessionResult>,
        timestamp: DateTime<Utc>,
    },
}

impl SyncEvent {
    /// Short event name for logging
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::SessionStateChanged { .. } => "SessionStateChanged",
            SyncEvent::StatusUnavailable { .. } => "StatusUnavailable",
            SyncEvent::ItemsChanged { .. } => "ItemsChanged",
            SyncEvent::ClipMarksChanged { .. } => "ClipMarksChanged",
            SyncEvent::CommentsChanged { .. } => "CommentsChanged",
            SyncEvent::CacheChanged { .. } => "CacheChanged",
            SyncEvent::ReloadRequired { .. } => "ReloadRequired",
            SyncEvent::NavigateToReview { .. } => "NavigateToReview",
            SyncEvent::CommentsFlushed { .. } => "CommentsFlushed",
            SyncEvent::LastSessionResult { .. } => "LastSessionResult",
        }
    }
}

/// Broadcast bus for SyncEvents
///
/// Slow subscribers lose the oldest events rather than blocking the engine.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use ingest_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: SyncEvent) -> Result<usize, broadcast::error::SendError<SyncEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SyncEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = SyncEvent::SessionStateChanged {
            old_state: SessionState::Recording,
            new_state: SessionState::Reviewing,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "SessionStateChanged");
        assert_eq!(json["old_state"], "RECORDING");
        assert_eq!(json["new_state"], "REVIEWING");
    }

    #[test]
    fn test_emit_without_subscribers_is_error() {
        let bus = EventBus::new(10);
        let result = bus.emit(SyncEvent::NavigateToReview { timestamp: Utc::now() });
        assert!(result.is_err());

        // Lossy variant never fails
        bus.emit_lossy(SyncEvent::NavigateToReview { timestamp: Utc::now() });
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit_lossy(SyncEvent::ReloadRequired {
            class: CounterClass::ItemOrder,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "ReloadRequired");
        match event {
            SyncEvent::ReloadRequired { class, .. } => assert_eq!(class, CounterClass::ItemOrder),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
