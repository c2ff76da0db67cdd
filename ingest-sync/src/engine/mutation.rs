//! Optimistic mutations and session actions
//!
//! An item mutation is validated locally, sent with the index the client
//! believes the item has, and applied locally only when the echoed
//! item-order counter is exactly one past the local value. Anything else
//! leaves the model untouched and invalidates the counter so the next poll
//! reloads the list.

use super::SyncEngine;
use crate::error::{Error, Result};
use crate::gate::{RequestClass, TokenScope};
use crate::items::ItemList;
use crate::session::UserAction;
use ingest_common::api::SessionAction;
use ingest_common::events::SyncEvent;
use ingest_common::{time, CounterClass};
use std::fmt;
use tracing::{debug, info, warn};

/// Item-order mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemMutation {
    MoveUp,
    MoveDown,
    Enable,
    Disable,
}

impl ItemMutation {
    fn user_action(self) -> UserAction {
        match self {
            ItemMutation::MoveUp | ItemMutation::MoveDown => UserAction::ReorderItems,
            ItemMutation::Enable | ItemMutation::Disable => UserAction::ToggleItems,
        }
    }

    /// Precondition; returns the item's current index
    fn check(self, items: &ItemList, id: i64) -> Result<usize> {
        match self {
            ItemMutation::MoveUp => items.check_move_up(id),
            ItemMutation::MoveDown => items.check_move_down(id),
            ItemMutation::Enable => items.check_enable(id),
            ItemMutation::Disable => items.check_disable(id),
        }
    }

    fn apply(self, items: &mut ItemList, id: i64) -> Result<()> {
        match self {
            ItemMutation::MoveUp => items.move_up(id),
            ItemMutation::MoveDown => items.move_down(id),
            ItemMutation::Enable => items.enable(id),
            ItemMutation::Disable => items.disable(id),
        }
    }
}

impl fmt::Display for ItemMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemMutation::MoveUp => "move up",
            ItemMutation::MoveDown => "move down",
            ItemMutation::Enable => "enable",
            ItemMutation::Disable => "disable",
        };
        write!(f, "{}", s)
    }
}

/// Why an echoed counter was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// Counter unchanged: the server refused the mutation
    Rejected { counter: i64 },
    /// Counter moved by more than one: changes we did not see
    Diverged { expected: i64, received: i64 },
    /// Counter moved backwards
    Regressed { expected: i64, received: i64 },
    /// No local counter to compare against
    Unknown { received: i64 },
    /// A newer request for the same resource was issued meanwhile
    Superseded,
    /// Echo matched but the local transform no longer applies
    Inapplicable,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::Rejected { counter } => write!(f, "rejected (counter stayed at {})", counter),
            Conflict::Diverged { expected, received } => {
                write!(f, "diverged (expected {}, received {})", expected, received)
            }
            Conflict::Regressed { expected, received } => {
                write!(f, "regressed (expected {}, received {})", expected, received)
            }
            Conflict::Unknown { received } => {
                write!(f, "no local counter (received {})", received)
            }
            Conflict::Superseded => write!(f, "superseded"),
            Conflict::Inapplicable => write!(f, "local transform not applicable"),
        }
    }
}

/// Classify an echoed counter against the local one; `None` means accepted
pub fn classify_echo(local: i64, received: i64) -> Option<Conflict> {
    if local < 0 {
        return Some(Conflict::Unknown { received });
    }
    match received - local {
        1 => None,
        0 => Some(Conflict::Rejected { counter: received }),
        d if d > 1 => Some(Conflict::Diverged {
            expected: local + 1,
            received,
        }),
        _ => Some(Conflict::Regressed {
            expected: local + 1,
            received,
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Echo confirmed; the local model now carries `counter`
    Applied { counter: i64 },
    /// Another request of the same class was outstanding
    Dropped,
    /// Model untouched, counter invalidated
    Invalidated(Conflict),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Accepted,
    /// Another request of the same class was outstanding
    Dropped,
}

impl SyncEngine {
    pub async fn move_item_up(&self, id: i64) -> Result<MutationOutcome> {
        self.mutate_item(ItemMutation::MoveUp, id).await
    }

    pub async fn move_item_down(&self, id: i64) -> Result<MutationOutcome> {
        self.mutate_item(ItemMutation::MoveDown, id).await
    }

    pub async fn enable_item(&self, id: i64) -> Result<MutationOutcome> {
        self.mutate_item(ItemMutation::Enable, id).await
    }

    pub async fn disable_item(&self, id: i64) -> Result<MutationOutcome> {
        self.mutate_item(ItemMutation::Disable, id).await
    }

    /// Validate, send and, on a confirming echo, apply one item mutation
    pub async fn mutate_item(&self, kind: ItemMutation, id: i64) -> Result<MutationOutcome> {
        let index = {
            let state = self.inner.state.read().await;
            if !state.session.permits(kind.user_action()) {
                return Err(Error::Rejected(format!(
                    "cannot {} items in state {}",
                    kind,
                    state.session.current()
                )));
            }
            kind.check(&state.items, id)?
        };

        let Some(_guard) = self.inner.gate.try_acquire(RequestClass::ItemMutation) else {
            debug!("Item mutation outstanding, dropping {} of item {}", kind, id);
            return Ok(MutationOutcome::Dropped);
        };
        let token = self
            .inner
            .tokens
            .issue(TokenScope::Resource(CounterClass::ItemOrder));

        let api = &self.inner.api;
        let result = match kind {
            ItemMutation::MoveUp => api.move_item_up(id, index).await,
            ItemMutation::MoveDown => api.move_item_down(id, index).await,
            ItemMutation::Enable => api.enable_item(id, index).await,
            ItemMutation::Disable => api.disable_item(id, index).await,
        };

        let mut state = self.inner.state.write().await;
        let echo = match result {
            Ok(echo) => echo,
            Err(e) => {
                state.counters.invalidate(CounterClass::ItemOrder);
                drop(state);
                warn!("Failed to {} item {}: {}", kind, id, e);
                self.emit_reload_required(CounterClass::ItemOrder);
                return Err(e);
            }
        };

        let received = echo.item_order_counter;
        let local = state.counters.get(CounterClass::ItemOrder);
        let conflict = if self.inner.tokens.is_latest(token) {
            classify_echo(local, received)
        } else {
            Some(Conflict::Superseded)
        };
        let conflict = match conflict {
            Some(conflict) => Some(conflict),
            None => match kind.apply(&mut state.items, id) {
                Ok(()) => None,
                Err(e) => {
                    warn!("Confirmed {} of item {} does not apply locally: {}", kind, id, e);
                    Some(Conflict::Inapplicable)
                }
            },
        };

        if let Some(conflict) = conflict {
            state.counters.invalidate(CounterClass::ItemOrder);
            drop(state);
            match conflict {
                Conflict::Rejected { .. } => {
                    info!("Server refused {} of item {}: {}", kind, id, conflict)
                }
                _ => warn!("{} of item {} {}, reloading item list", kind, id, conflict),
            }
            self.emit_reload_required(CounterClass::ItemOrder);
            return Ok(MutationOutcome::Invalidated(conflict));
        }

        state.counters.observe(CounterClass::ItemOrder, received);
        let item_count = state.items.len();
        drop(state);

        info!("Item {} {} applied (counter {})", id, kind, received);
        self.emit(SyncEvent::ItemsChanged {
            item_count,
            counter: received,
            timestamp: time::now(),
        });
        Ok(MutationOutcome::Applied { counter: received })
    }

    // ========================================
    // Boundary marks
    // ========================================

    /// Mark an item boundary at the current review position
    ///
    /// There is no local echo; the clip counter picks the change up on the
    /// next poll.
    pub async fn mark_item_boundary(&self) -> Result<ActionOutcome> {
        self.boundary(UserAction::MarkItem).await
    }

    pub async fn clear_item_boundary(&self) -> Result<ActionOutcome> {
        self.boundary(UserAction::ClearItem).await
    }

    async fn boundary(&self, action: UserAction) -> Result<ActionOutcome> {
        self.require_permission(action).await?;

        let Some(_guard) = self.inner.gate.try_acquire(RequestClass::BoundaryMark) else {
            debug!("Boundary request outstanding, dropping {:?}", action);
            return Ok(ActionOutcome::Dropped);
        };

        let result = if action == UserAction::MarkItem {
            self.inner.api.mark_item_boundary().await
        } else {
            self.inner.api.clear_item_boundary().await
        };

        match result {
            Ok(echo) => {
                debug!("{:?} sent, clip counter now {}", action, echo.item_clip_counter);
                Ok(ActionOutcome::Accepted)
            }
            Err(e) => {
                self.inner
                    .state
                    .write()
                    .await
                    .counters
                    .invalidate(CounterClass::ItemClips);
                warn!("{:?} failed: {}", action, e);
                self.emit_reload_required(CounterClass::ItemClips);
                Err(e)
            }
        }
    }

    // ========================================
    // Comments
    // ========================================

    /// Keep edited comment text until it is saved or flushed
    pub async fn set_comment_draft(&self, text: impl Into<String>) {
        self.inner.state.write().await.comments.draft = Some(text.into());
    }

    pub async fn discard_comment_draft(&self) {
        self.inner.state.write().await.comments.draft = None;
    }

    /// Send the pending comment draft
    pub async fn save_comments(&self) -> Result<MutationOutcome> {
        self.require_permission(UserAction::EditComments).await?;
        self.send_comments().await
    }

    /// Fire-and-forget send of pending comments; a failure is not retried
    pub fn flush_comments(&self) {
        self.spawn_comment_flush();
    }

    pub(crate) fn spawn_comment_flush(&self) {
        let engine = self.clone();
        self.spawn_tracked(async move {
            if !engine.inner.state.read().await.comments.has_pending() {
                return;
            }
            let ok = match engine.send_comments().await {
                Ok(MutationOutcome::Applied { .. }) => true,
                Ok(outcome) => {
                    warn!("Comment flush not confirmed: {:?}", outcome);
                    false
                }
                Err(e) => {
                    warn!("Comment flush failed: {}", e);
                    false
                }
            };
            engine.emit(SyncEvent::CommentsFlushed {
                ok,
                timestamp: time::now(),
            });
        });
    }

    async fn send_comments(&self) -> Result<MutationOutcome> {
        let draft = self.inner.state.read().await.comments.draft.clone();
        let Some(text) = draft else {
            return Err(Error::Rejected("no pending comments".to_string()));
        };

        let Some(_guard) = self.inner.gate.try_acquire(RequestClass::CommentSave) else {
            debug!("Comment save outstanding, dropping request");
            return Ok(MutationOutcome::Dropped);
        };
        let token = self
            .inner
            .tokens
            .issue(TokenScope::Resource(CounterClass::Comments));

        let result = self.inner.api.save_comments(&text).await;

        let mut state = self.inner.state.write().await;
        let echo = match result {
            Ok(echo) => echo,
            Err(e) => {
                state.counters.invalidate(CounterClass::Comments);
                drop(state);
                self.emit_reload_required(CounterClass::Comments);
                return Err(e);
            }
        };

        let received = echo.comments_counter;
        let conflict = if self.inner.tokens.is_latest(token) {
            classify_echo(state.counters.get(CounterClass::Comments), received)
        } else {
            Some(Conflict::Superseded)
        };
        if let Some(conflict) = conflict {
            state.counters.invalidate(CounterClass::Comments);
            drop(state);
            warn!("Comment save {}, reloading comments", conflict);
            self.emit_reload_required(CounterClass::Comments);
            return Ok(MutationOutcome::Invalidated(conflict));
        }

        // A newer draft typed while the save was in flight stays pending
        if state.comments.draft.as_deref() == Some(text.as_str()) {
            state.comments.draft = None;
        }
        state.comments.server_text = text;
        state.counters.observe(CounterClass::Comments, received);
        drop(state);

        info!("Comments saved (counter {})", received);
        self.emit(SyncEvent::CommentsChanged {
            counter: received,
            timestamp: time::now(),
        });
        Ok(MutationOutcome::Applied { counter: received })
    }

    // ========================================
    // Session actions
    // ========================================

    pub async fn start_session(&self) -> Result<ActionOutcome> {
        self.session_action(SessionAction::Start).await
    }

    pub async fn stop_recording(&self) -> Result<ActionOutcome> {
        self.session_action(SessionAction::Stop).await
    }

    pub async fn abort_session(&self) -> Result<ActionOutcome> {
        self.session_action(SessionAction::Abort).await
    }

    pub async fn complete_review(&self) -> Result<ActionOutcome> {
        self.session_action(SessionAction::Complete).await
    }

    pub async fn start_chunking(&self) -> Result<ActionOutcome> {
        self.session_action(SessionAction::Chunk).await
    }

    /// Permission-checked session command; the next poll shows its effect
    pub async fn session_action(&self, action: SessionAction) -> Result<ActionOutcome> {
        self.require_permission(action.into()).await?;

        let Some(_guard) = self.inner.gate.try_acquire(RequestClass::SessionAction) else {
            debug!("Session action outstanding, dropping {}", action);
            return Ok(ActionOutcome::Dropped);
        };

        let ack = self.inner.api.session_action(action).await?;
        if !ack.ok {
            let reason = ack
                .message
                .unwrap_or_else(|| format!("server refused {}", action));
            warn!("Session action {} refused: {}", action, reason);
            return Err(Error::Rejected(reason));
        }

        info!("Session action {} accepted", action);
        Ok(ActionOutcome::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_echo() {
        assert_eq!(classify_echo(4, 5), None);
        assert_eq!(classify_echo(4, 4), Some(Conflict::Rejected { counter: 4 }));
        assert_eq!(
            classify_echo(4, 7),
            Some(Conflict::Diverged {
                expected: 5,
                received: 7
            })
        );
        assert_eq!(
            classify_echo(4, 2),
            Some(Conflict::Regressed {
                expected: 5,
                received: 2
            })
        );
        assert_eq!(classify_echo(-1, 0), Some(Conflict::Unknown { received: 0 }));
    }

    #[test]
    fn test_mutation_permissions() {
        assert_eq!(ItemMutation::MoveUp.user_action(), UserAction::ReorderItems);
        assert_eq!(ItemMutation::MoveDown.user_action(), UserAction::ReorderItems);
        assert_eq!(ItemMutation::Enable.user_action(), UserAction::ToggleItems);
        assert_eq!(ItemMutation::Disable.user_action(), UserAction::ToggleItems);
    }

    #[test]
    fn test_conflict_display() {
        let text = Conflict::Diverged {
            expected: 5,
            received: 9,
        }
        .to_string();
        assert!(text.contains("expected 5"));
        assert!(text.contains("received 9"));
    }
}
