//! Session state machine
//!
//! Interprets the server-reported state and produces one-time side effects on
//! transitions. Transitions are driven only by the polled state field; the
//! client never infers them.
//!
//! **Edge-triggered effects:**
//! - RECORDING → REVIEWING / PREPARE_CHUNKING / CHUNKING: flush pending
//!   comments and navigate to the review view, once per transition
//! - Entering NOT_STARTED publishes the last session result; leaving it
//!   clears the result immediately
//!
//! Edges compare against the last *known* state, so a failed poll (UNKNOWN)
//! between RECORDING and REVIEWING neither hides nor repeats the edge.

use ingest_common::api::{SessionAction, StatusPayload};
use ingest_common::{SessionResult, SessionState};
use tracing::info;

/// User-initiated actions, checked against the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserAction {
    Start,
    Stop,
    Abort,
    Complete,
    Chunk,
    MarkItem,
    ClearItem,
    ReorderItems,
    ToggleItems,
    EditComments,
}

impl From<SessionAction> for UserAction {
    fn from(action: SessionAction) -> Self {
        match action {
            SessionAction::Start => UserAction::Start,
            SessionAction::Stop => UserAction::Stop,
            SessionAction::Abort => UserAction::Abort,
            SessionAction::Complete => UserAction::Complete,
            SessionAction::Chunk => UserAction::Chunk,
        }
    }
}

/// Whether `state` accepts `action`
pub fn permits(state: SessionState, action: UserAction) -> bool {
    use UserAction::*;
    match state {
        SessionState::NotStarted | SessionState::End | SessionState::Unknown => false,
        SessionState::Ready => matches!(
            action,
            Start | Abort | ReorderItems | ToggleItems | EditComments
        ),
        SessionState::Recording => matches!(action, Stop | Abort | EditComments),
        SessionState::Reviewing => matches!(
            action,
            Complete | Abort | ReorderItems | ToggleItems | EditComments
        ),
        SessionState::PrepareChunking => {
            matches!(action, MarkItem | ClearItem | Chunk | Abort | EditComments)
        }
        SessionState::Chunking => matches!(action, Abort),
    }
}

/// One-time side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEffect {
    /// Send pending comments (fire-and-forget)
    FlushComments,
    /// Switch the presentation to the review view
    NavigateToReview,
    /// Last session result changed (None once NOT_STARTED is left)
    LastResultChanged(Option<SessionResult>),
}

/// Outcome of feeding one status into the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub old_state: SessionState,
    pub new_state: SessionState,
    pub effects: Vec<TransitionEffect>,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.old_state != self.new_state
    }
}

#[derive(Debug, Clone)]
pub struct SessionMachine {
    current: SessionState,
    last_known: Option<SessionState>,
    last_result: Option<SessionResult>,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            current: SessionState::Unknown,
            last_known: None,
            last_result: None,
        }
    }

    pub fn current(&self) -> SessionState {
        self.current
    }

    /// Last state actually reported by the server
    pub fn last_known(&self) -> Option<SessionState> {
        self.last_known
    }

    /// Only present while the state is NOT_STARTED
    pub fn last_result(&self) -> Option<SessionResult> {
        self.last_result
    }

    pub fn permits(&self, action: UserAction) -> bool {
        permits(self.current, action)
    }

    /// Feed a decoded status
    pub fn observe(&mut self, status: &StatusPayload) -> Transition {
        let old_state = self.current;
        let new_state = status.state;
        let mut effects = Vec::new();

        if self.last_known == Some(SessionState::Recording) && new_state.is_post_recording() {
            info!("Recording finished ({} -> {})", SessionState::Recording, new_state);
            effects.push(TransitionEffect::FlushComments);
            effects.push(TransitionEffect::NavigateToReview);
        }

        let result = if new_state == SessionState::NotStarted {
            Some(status.last_session_result.unwrap_or(SessionResult::Unknown))
        } else {
            None
        };
        if result != self.last_result {
            effects.push(TransitionEffect::LastResultChanged(result));
            self.last_result = result;
        }

        if old_state != new_state {
            info!("Session state {} -> {}", old_state, new_state);
        }

        self.current = new_state;
        self.last_known = Some(new_state);

        Transition {
            old_state,
            new_state,
            effects,
        }
    }

    /// Status unavailable
    pub fn mark_unknown(&mut self) -> Transition {
        let old_state = self.current;
        let mut effects = Vec::new();
        if self.last_result.take().is_some() {
            effects.push(TransitionEffect::LastResultChanged(None));
        }
        self.current = SessionState::Unknown;
        Transition {
            old_state,
            new_state: SessionState::Unknown,
            effects,
        }
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_common::api::PROTOCOL_VERSION;

    fn status(state: SessionState) -> StatusPayload {
        StatusPayload {
            version: PROTOCOL_VERSION,
            state,
            item_order_counter: None,
            item_clip_counter: None,
            comments_counter: None,
            cache_counter: None,
            last_session_result: None,
            session: None,
        }
    }

    fn review_edges(transition: &Transition) -> usize {
        transition
            .effects
            .iter()
            .filter(|e| **e == TransitionEffect::NavigateToReview)
            .count()
    }

    #[test]
    fn test_starts_unknown() {
        let machine = SessionMachine::new();
        assert_eq!(machine.current(), SessionState::Unknown);
        assert!(machine.last_known().is_none());
        assert!(!machine.permits(UserAction::Start));
    }

    #[test]
    fn test_recording_to_reviewing_fires_once() {
        let mut machine = SessionMachine::new();
        machine.observe(&status(SessionState::Recording));

        let t = machine.observe(&status(SessionState::Reviewing));
        assert_eq!(
            t.effects,
            vec![TransitionEffect::FlushComments, TransitionEffect::NavigateToReview]
        );

        // Repeated polls in the destination state are not edges
        for _ in 0..5 {
            let t = machine.observe(&status(SessionState::Reviewing));
            assert!(t.effects.is_empty());
            assert!(!t.changed());
        }
    }

    #[test]
    fn test_recording_to_each_post_recording_state() {
        for dest in [
            SessionState::Reviewing,
            SessionState::PrepareChunking,
            SessionState::Chunking,
        ] {
            let mut machine = SessionMachine::new();
            machine.observe(&status(SessionState::Recording));
            let t = machine.observe(&status(dest));
            assert_eq!(review_edges(&t), 1, "edge into {}", dest);
        }
    }

    #[test]
    fn test_recording_to_end_is_not_review_edge() {
        let mut machine = SessionMachine::new();
        machine.observe(&status(SessionState::Recording));
        let t = machine.observe(&status(SessionState::End));
        assert_eq!(review_edges(&t), 0);
    }

    #[test]
    fn test_edge_survives_unknown_gap() {
        let mut machine = SessionMachine::new();
        machine.observe(&status(SessionState::Recording));
        machine.mark_unknown();
        assert_eq!(machine.current(), SessionState::Unknown);

        let t = machine.observe(&status(SessionState::Reviewing));
        assert_eq!(review_edges(&t), 1);

        // A later gap does not repeat it
        machine.mark_unknown();
        let t = machine.observe(&status(SessionState::Reviewing));
        assert_eq!(review_edges(&t), 0);
    }

    #[test]
    fn test_last_result_exposed_only_in_not_started() {
        let mut machine = SessionMachine::new();

        let mut s = status(SessionState::NotStarted);
        s.last_session_result = Some(SessionResult::Success);
        let t = machine.observe(&s);
        assert_eq!(
            t.effects,
            vec![TransitionEffect::LastResultChanged(Some(SessionResult::Success))]
        );
        assert_eq!(machine.last_result(), Some(SessionResult::Success));

        // Same result again: no effect
        let t = machine.observe(&s);
        assert!(t.effects.is_empty());

        // Leaving NOT_STARTED clears it at once
        let t = machine.observe(&status(SessionState::Ready));
        assert_eq!(t.effects, vec![TransitionEffect::LastResultChanged(None)]);
        assert!(machine.last_result().is_none());
    }

    #[test]
    fn test_missing_result_in_not_started_is_unknown() {
        let mut machine = SessionMachine::new();
        machine.observe(&status(SessionState::NotStarted));
        assert_eq!(machine.last_result(), Some(SessionResult::Unknown));
    }

    #[test]
    fn test_permission_table() {
        assert!(permits(SessionState::Ready, UserAction::Start));
        assert!(!permits(SessionState::Recording, UserAction::Start));
        assert!(permits(SessionState::Recording, UserAction::Stop));
        assert!(permits(SessionState::PrepareChunking, UserAction::MarkItem));
        assert!(!permits(SessionState::Reviewing, UserAction::MarkItem));
        assert!(permits(SessionState::Reviewing, UserAction::ReorderItems));
        assert!(!permits(SessionState::Chunking, UserAction::Chunk));

        for action in [UserAction::Start, UserAction::Stop, UserAction::Abort] {
            assert!(!permits(SessionState::NotStarted, action));
            assert!(!permits(SessionState::End, action));
            assert!(!permits(SessionState::Unknown, action));
        }
    }
}
