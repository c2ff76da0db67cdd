//! Local session model
//!
//! Everything the engine knows about the session, mutated only while the
//! engine's state lock is held and never across a remote call.

use crate::counters::ChangeCounterStore;
use crate::items::ItemList;
use crate::session::SessionMachine;
use ingest_common::api::{CacheEntry, Item, SessionInfo};
use ingest_common::{CounterClass, SessionResult, SessionState};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Server comments plus the operator's unsent draft
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentsState {
    /// Last text confirmed by the server
    pub server_text: String,
    /// Local edits not yet sent
    pub draft: Option<String>,
}

impl CommentsState {
    pub fn has_pending(&self) -> bool {
        self.draft.is_some()
    }

    /// Take new server text; a draft the server already holds is no longer pending
    ///
    /// Covers a save whose completion was overtaken by a comments fetch.
    pub fn accept_server_text(&mut self, text: String) {
        if self.draft.as_deref() == Some(text.as_str()) {
            self.draft = None;
        }
        self.server_text = text;
    }
}

/// Engine-owned session model
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    pub session: SessionMachine,
    pub counters: ChangeCounterStore,
    pub items: ItemList,
    pub comments: CommentsState,
    pub cache: Vec<CacheEntry>,
    pub session_info: Option<SessionInfo>,
    /// Last status poll failed
    pub degraded: bool,
    /// When the last good status arrived
    pub last_status_at: Option<DateTime<Utc>>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// `tracked` are the counters followed in the current state; only those
    /// count towards `reload_required`
    pub fn snapshot(&self, tracked: &[CounterClass]) -> SessionSnapshot {
        SessionSnapshot {
            state: self.session.current(),
            last_session_result: self.session.last_result(),
            session_info: self.session_info.clone(),
            items: self.items.items().to_vec(),
            comments: self.comments.server_text.clone(),
            comment_draft: self.comments.draft.clone(),
            cache: self.cache.clone(),
            counters: CounterClass::ALL
                .into_iter()
                .map(|class| (class, self.counters.get(class)))
                .collect(),
            reload_required: self.counters.reload_required(tracked),
            degraded: self.degraded,
            last_status_at: self.last_status_at,
        }
    }
}

/// Read-only view handed to the presentation side
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub last_session_result: Option<SessionResult>,
    pub session_info: Option<SessionInfo>,
    pub items: Vec<Item>,
    pub comments: String,
    pub comment_draft: Option<String>,
    pub cache: Vec<CacheEntry>,
    pub counters: Vec<(CounterClass, i64)>,
    /// Some counter is unknown; a full reload is pending
    pub reload_required: bool,
    /// Status unavailable; display "no data"
    pub degraded: bool,
    pub last_status_at: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    pub fn counter(&self, class: CounterClass) -> Option<i64> {
        self.counters
            .iter()
            .find(|(c, _)| *c == class)
            .map(|(_, value)| *value)
    }

    pub fn item_ids(&self) -> Vec<i64> {
        self.items.iter().map(|item| item.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::UNKNOWN_COUNTER;

    #[test]
    fn test_fresh_state_snapshot() {
        let state = SyncState::new();
        let snapshot = state.snapshot(&[CounterClass::ItemOrder]);

        assert_eq!(snapshot.state, SessionState::Unknown);
        assert!(snapshot.items.is_empty());
        assert!(snapshot.reload_required);
        assert!(!state.snapshot(&[]).reload_required);
        assert!(!snapshot.degraded);
        assert!(snapshot.last_status_at.is_none());
        assert_eq!(snapshot.counter(CounterClass::ItemOrder), Some(UNKNOWN_COUNTER));
    }

    #[test]
    fn test_pending_comments() {
        let mut comments = CommentsState::default();
        assert!(!comments.has_pending());
        comments.draft = Some("dropout at 10:02".to_string());
        assert!(comments.has_pending());
    }

    #[test]
    fn test_server_text_matching_draft_clears_it() {
        let mut comments = CommentsState {
            draft: Some("hum on side B".to_string()),
            ..Default::default()
        };
        comments.accept_server_text("hum".to_string());
        assert!(comments.has_pending());

        comments.accept_server_text("hum on side B".to_string());
        assert!(!comments.has_pending());
        assert_eq!(comments.server_text, "hum on side B");
    }
}
