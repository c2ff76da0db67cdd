//! Request gate and request tokens
//!
//! **Responsibilities:**
//! - Per request-class latch: at most one outstanding call per class
//! - Release on every exit path (the guard releases on drop)
//! - Monotonic request tokens so superseded completions can be discarded
//!
//! Denied attempts are dropped, never queued. The next poll tick or user
//! action tries again.

use ingest_common::CounterClass;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Classes of remote call guarded independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestClass {
    Status,
    ItemList,
    ClipMarks,
    Comments,
    CacheContents,
    ItemMutation,
    BoundaryMark,
    CommentSave,
    SessionAction,
}

impl RequestClass {
    /// Fetch class for a counter-tracked resource
    pub fn fetch_for(class: CounterClass) -> Self {
        match class {
            CounterClass::ItemOrder => RequestClass::ItemList,
            CounterClass::ItemClips => RequestClass::ClipMarks,
            CounterClass::Comments => RequestClass::Comments,
            CounterClass::CacheContents => RequestClass::CacheContents,
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Critical sections never panic; a poisoned lock still holds valid data
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Per-class "request outstanding" latch
#[derive(Debug, Clone, Default)]
pub struct RequestGate {
    busy: Arc<Mutex<HashSet<RequestClass>>>,
}

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `class` busy if it is free
    ///
    /// Returns `None` when a request of this class is already outstanding;
    /// the caller skips this attempt.
    pub fn try_acquire(&self, class: RequestClass) -> Option<GateGuard> {
        let mut busy = lock(&self.busy);
        if !busy.insert(class) {
            debug!("Request gate busy for {:?}, dropping attempt", class);
            return None;
        }
        Some(GateGuard {
            gate: self.clone(),
            class,
        })
    }

    pub fn is_busy(&self, class: RequestClass) -> bool {
        lock(&self.busy).contains(&class)
    }

    fn release(&self, class: RequestClass) {
        lock(&self.busy).remove(&class);
    }
}

/// Proof of an acquired gate; releases the class when dropped
#[derive(Debug)]
pub struct GateGuard {
    gate: RequestGate,
    class: RequestClass,
}

impl GateGuard {
    /// Release explicitly (same as dropping the guard)
    pub fn release(self) {}
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.gate.release(self.class);
    }
}

/// What a request token is issued against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenScope {
    Status,
    Resource(CounterClass),
}

/// Stamp carried by an outstanding call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken {
    scope: TokenScope,
    seq: u64,
}

/// Latest issued token per scope
///
/// A completion is applied only if its token is still the latest for its
/// scope. Fetches and mutations of the same resource share a scope, so a
/// list fetch overtaken by a mutation (or the other way round) is discarded.
#[derive(Debug, Default)]
pub struct TokenLedger {
    latest: Mutex<HashMap<TokenScope, u64>>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, scope: TokenScope) -> RequestToken {
        let mut latest = lock(&self.latest);
        let seq = latest.entry(scope).or_insert(0);
        *seq += 1;
        RequestToken { scope, seq: *seq }
    }

    pub fn is_latest(&self, token: RequestToken) -> bool {
        lock(&self.latest).get(&token.scope).copied() == Some(token.seq)
    }

    /// Make every outstanding token stale
    pub fn supersede_all(&self) {
        for seq in lock(&self.latest).values_mut() {
            *seq += 1;
        }
    }
}
