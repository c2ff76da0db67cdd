//! Status polling and change-driven sub-resource fetches
//!
//! One tick: fetch the status, run the session state machine, compare every
//! counter relevant to the current state against the local store and
//! dispatch a fetch for each stale resource. Dispatched fetches complete in
//! the background; `SyncEngine::settle` waits for them.

use super::SyncEngine;
use crate::error::{Error, Result};
use crate::gate::{RequestClass, RequestToken, TokenScope};
use crate::session::{Transition, TransitionEffect};
use crate::state::SyncState;
use ingest_common::api::{
    CacheContentsPayload, ClipMarksPayload, CommentsPayload, ItemListPayload, SessionInfo,
    StatusPayload,
};
use ingest_common::events::SyncEvent;
use ingest_common::{time, CounterClass, SessionState};
use tracing::{debug, info, warn};

/// Result of one poll tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    /// Session state after the tick
    pub state: SessionState,
    /// Sub-resource fetches dispatched by this tick
    pub dispatched: Vec<CounterClass>,
    /// Previous status request still outstanding; nothing was sent
    pub skipped: bool,
}

impl TickOutcome {
    fn skipped(state: SessionState) -> Self {
        Self {
            state,
            dispatched: Vec::new(),
            skipped: true,
        }
    }
}

/// Counters worth following in `state`
pub fn relevant_counters(state: SessionState, track_cache: bool) -> Vec<CounterClass> {
    if !state.is_active() {
        return Vec::new();
    }

    let mut classes = vec![CounterClass::ItemOrder, CounterClass::ItemClips];
    if state != SessionState::Ready {
        classes.push(CounterClass::Comments);
    }
    if track_cache {
        classes.push(CounterClass::CacheContents);
    }
    classes
}

/// Source spool changed under us: a different session
fn is_new_session(previous: Option<&SessionInfo>, next: Option<&SessionInfo>) -> bool {
    matches!((previous, next), (Some(a), Some(b)) if a.source_spool != b.source_spool)
}

enum Fetched {
    Items(ItemListPayload),
    ClipMarks(ClipMarksPayload),
    Comments(CommentsPayload),
    Cache(CacheContentsPayload),
}

impl SyncEngine {
    /// Run one poll cycle
    ///
    /// Returns the status error if the status request failed; the model is
    /// then in the unknown state and every counter is kept for the next tick.
    pub async fn tick(&self) -> Result<TickOutcome> {
        let Some(_guard) = self.inner.gate.try_acquire(RequestClass::Status) else {
            debug!("Status request still outstanding, skipping tick");
            return Ok(TickOutcome::skipped(self.session_state().await));
        };
        let token = self.inner.tokens.issue(TokenScope::Status);

        match self.inner.api.fetch_status().await {
            Ok(status) => Ok(self.apply_status(status, token).await),
            Err(e) => {
                self.apply_status_failure(&e, token).await;
                Err(e)
            }
        }
    }

    async fn apply_status(&self, status: StatusPayload, token: RequestToken) -> TickOutcome {
        let (transition, stale) = {
            let mut state = self.inner.state.write().await;
            if !self.inner.tokens.is_latest(token) {
                debug!("Discarding superseded status response");
                return TickOutcome::skipped(state.session.current());
            }

            if is_new_session(state.session_info.as_ref(), status.session.as_ref()) {
                info!("Source spool changed, discarding local session model");
                discard_session_model(&mut state);
            }
            state.degraded = false;
            state.last_status_at = Some(time::now());
            state.session_info = status.session.clone();

            let transition = state.session.observe(&status);
            if transition.changed() && transition.new_state == SessionState::NotStarted {
                discard_session_model(&mut state);
            }

            let mut stale: Vec<CounterClass> =
                relevant_counters(transition.new_state, self.inner.config.track_cache)
                    .into_iter()
                    .filter(|&class| {
                        status
                            .counter(class)
                            .is_some_and(|value| state.counters.is_stale(class, value))
                    })
                    .collect();

            // Clip marks are applied onto the item list; fetch them once it is current
            if stale.contains(&CounterClass::ItemOrder)
                || self.inner.gate.is_busy(RequestClass::ItemList)
            {
                stale.retain(|&class| class != CounterClass::ItemClips);
            }
            (transition, stale)
        };

        self.publish_transition(&transition);

        let dispatched = stale
            .into_iter()
            .filter(|&class| self.dispatch_fetch(class))
            .collect();

        TickOutcome {
            state: transition.new_state,
            dispatched,
            skipped: false,
        }
    }

    async fn apply_status_failure(&self, error: &Error, token: RequestToken) {
        let transition = {
            let mut state = self.inner.state.write().await;
            if !self.inner.tokens.is_latest(token) {
                return;
            }
            state.degraded = true;
            state.session.mark_unknown()
        };

        warn!("Status unavailable: {}", error);
        self.publish_transition(&transition);
        self.emit(SyncEvent::StatusUnavailable {
            reason: error.to_string(),
            timestamp: time::now(),
        });
    }

    fn publish_transition(&self, transition: &Transition) {
        if transition.changed() {
            self.emit(SyncEvent::SessionStateChanged {
                old_state: transition.old_state,
                new_state: transition.new_state,
                timestamp: time::now(),
            });
        }

        for effect in &transition.effects {
            match *effect {
                TransitionEffect::FlushComments => self.spawn_comment_flush(),
                TransitionEffect::NavigateToReview => self.emit(SyncEvent::NavigateToReview {
                    timestamp: time::now(),
                }),
                TransitionEffect::LastResultChanged(result) => {
                    self.emit(SyncEvent::LastSessionResult {
                        result,
                        timestamp: time::now(),
                    })
                }
            }
        }
    }

    /// Start a background fetch of `class`; false if one is already in flight
    fn dispatch_fetch(&self, class: CounterClass) -> bool {
        let Some(guard) = self.inner.gate.try_acquire(RequestClass::fetch_for(class)) else {
            debug!("{} fetch already outstanding", class);
            return false;
        };
        let token = self.inner.tokens.issue(TokenScope::Resource(class));

        let engine = self.clone();
        self.spawn_tracked(async move {
            engine.fetch_resource(class, token).await;
            guard.release();
        });
        true
    }

    async fn fetch_resource(&self, class: CounterClass, token: RequestToken) {
        let api = &self.inner.api;
        let result = match class {
            CounterClass::ItemOrder => api.fetch_item_list().await.map(Fetched::Items),
            CounterClass::ItemClips => api.fetch_clip_marks().await.map(Fetched::ClipMarks),
            CounterClass::Comments => api.fetch_comments().await.map(Fetched::Comments),
            CounterClass::CacheContents => api.fetch_cache_contents().await.map(Fetched::Cache),
        };

        let events = {
            let mut state = self.inner.state.write().await;
            if !self.inner.tokens.is_latest(token) {
                debug!("Discarding superseded {} response", class);
                return;
            }
            match result.and_then(|fetched| apply_fetched(&mut state, fetched)) {
                Ok(event) => vec![event],
                Err(e) => {
                    warn!("Refreshing {} failed: {}", class, e);
                    let mut invalid = vec![class];
                    // Marks that do not fit the local list mean the list is stale too
                    if class == CounterClass::ItemClips && matches!(e, Error::InvalidState(_)) {
                        invalid.push(CounterClass::ItemOrder);
                    }
                    invalid
                        .into_iter()
                        .map(|class| {
                            state.counters.invalidate(class);
                            SyncEvent::ReloadRequired {
                                class,
                                timestamp: time::now(),
                            }
                        })
                        .collect()
                }
            }
        };
        for event in events {
            self.emit(event);
        }
    }
}

fn discard_session_model(state: &mut SyncState) {
    state.items.clear();
    state.cache.clear();
    state.comments = Default::default();
    state.counters.invalidate_all();
}

/// Replace the local copy of one resource; the counter is recorded only on success
fn apply_fetched(state: &mut SyncState, fetched: Fetched) -> Result<SyncEvent> {
    let timestamp = time::now();
    match fetched {
        Fetched::Items(payload) => {
            state.items.replace(payload.items)?;
            state
                .counters
                .observe(CounterClass::ItemOrder, payload.item_order_counter);
            debug!(
                "Item list refreshed: {} items (counter {})",
                state.items.len(),
                payload.item_order_counter
            );
            Ok(SyncEvent::ItemsChanged {
                item_count: state.items.len(),
                counter: payload.item_order_counter,
                timestamp,
            })
        }
        Fetched::ClipMarks(payload) => {
            if state.counters.get(CounterClass::ItemOrder) < 0 {
                return Err(Error::InvalidState(
                    "clip marks arrived before the item list".to_string(),
                ));
            }
            let updated = state.items.apply_clip_marks(&payload.marks)?;
            state
                .counters
                .observe(CounterClass::ItemClips, payload.item_clip_counter);
            debug!("Clip marks refreshed: {} items updated", updated);
            Ok(SyncEvent::ClipMarksChanged {
                counter: payload.item_clip_counter,
                timestamp,
            })
        }
        Fetched::Comments(payload) => {
            state.comments.accept_server_text(payload.text);
            state
                .counters
                .observe(CounterClass::Comments, payload.comments_counter);
            Ok(SyncEvent::CommentsChanged {
                counter: payload.comments_counter,
                timestamp,
            })
        }
        Fetched::Cache(payload) => {
            let entry_count = payload.entries.len();
            state.cache = payload.entries;
            state
                .counters
                .observe(CounterClass::CacheContents, payload.cache_counter);
            Ok(SyncEvent::CacheChanged {
                entry_count,
                counter: payload.cache_counter,
                timestamp,
            })
        }
    }
}
