//! Session synchronization engine
//!
//! **Responsibilities:**
//! - Owns the local session model (items, counters, state machine, comments, cache)
//! - Poll loop lifecycle (start, stop, single-step `tick`)
//! - Tracking of dispatched sub-resource fetches (`settle`)
//! - Optimistic item mutations and session actions (see `mutation`)
//!
//! All model mutation happens under one `RwLock`, never held across a remote
//! call, so completions of different request classes may interleave freely
//! while each completion body runs alone.

mod mutation;
mod poll;

pub use mutation::{classify_echo, ActionOutcome, Conflict, ItemMutation, MutationOutcome};
pub use poll::{relevant_counters, TickOutcome};

use crate::api::RemoteApi;
use crate::gate::{lock, RequestClass, RequestGate, TokenLedger};
use crate::error::{Error, Result};
use crate::session::{permits, UserAction};
use crate::state::{SessionSnapshot, SyncState};
use ingest_common::config::ClientConfig;
use ingest_common::events::{EventBus, SyncEvent};
use ingest_common::{time, CounterClass, SessionState};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Engine tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Pause between the end of one tick's dispatch and the next tick
    pub poll_interval: Duration,
    /// Follow the cache-contents counter
    pub track_cache: bool,
    /// EventBus channel capacity
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(ingest_common::config::DEFAULT_POLL_INTERVAL_MS),
            track_cache: true,
            event_capacity: 100,
        }
    }
}

impl From<&ClientConfig> for EngineConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            poll_interval: time::millis_to_duration(config.poll_interval_ms),
            track_cache: config.track_cache,
            ..Self::default()
        }
    }
}

/// Grace period for the poll task to observe shutdown
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

struct Poller {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct EngineInner {
    api: Arc<dyn RemoteApi>,
    config: EngineConfig,
    state: RwLock<SyncState>,
    gate: RequestGate,
    tokens: TokenLedger,
    events: EventBus,
    /// Dispatched sub-resource fetches and comment flushes
    pending: Mutex<Vec<JoinHandle<()>>>,
    poller: Mutex<Option<Poller>>,
}

/// Handle to a synchronization engine; clones share the same engine
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    pub fn new(api: Arc<dyn RemoteApi>, config: EngineConfig) -> Self {
        let events = EventBus::new(config.event_capacity);
        Self {
            inner: Arc::new(EngineInner {
                api,
                config,
                state: RwLock::new(SyncState::new()),
                gate: RequestGate::new(),
                tokens: TokenLedger::new(),
                events,
                pending: Mutex::new(Vec::new()),
                poller: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Current view for the presentation side
    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.state.read().await;
        state.snapshot(&self.tracked_counters(&state))
    }

    pub async fn session_state(&self) -> SessionState {
        self.inner.state.read().await.session.current()
    }

    pub async fn counter(&self, class: CounterClass) -> i64 {
        self.inner.state.read().await.counters.get(class)
    }

    /// A followed counter is unknown; the next poll performs a full reload
    pub async fn reload_required(&self) -> bool {
        let state = self.inner.state.read().await;
        state.counters.reload_required(&self.tracked_counters(&state))
    }

    /// Counters followed in the last known session state
    fn tracked_counters(&self, state: &SyncState) -> Vec<CounterClass> {
        let session = state
            .session
            .last_known()
            .unwrap_or_else(|| state.session.current());
        relevant_counters(session, self.inner.config.track_cache)
    }

    /// Whether a request of `class` is outstanding
    pub fn is_outstanding(&self, class: RequestClass) -> bool {
        self.inner.gate.is_busy(class)
    }

    /// Spawn the repeating poll task
    ///
    /// The next tick is scheduled only after the current tick's work is
    /// dispatched, so the effective period is the interval plus processing
    /// time. Returns false if the loop is already running.
    pub fn start(&self) -> bool {
        let mut poller = lock(&self.inner.poller);
        if poller.is_some() {
            return false;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let engine = self.clone();
        let interval = self.inner.config.poll_interval;

        let handle = tokio::spawn(async move {
            info!("Poll loop started (interval {:?})", interval);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    result = engine.tick() => {
                        if let Err(e) = result {
                            warn!("Status poll failed: {}", e);
                        }
                    }
                }
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            debug!("Poll loop exited");
        });

        *poller = Some(Poller {
            shutdown_tx,
            handle,
        });
        true
    }

    /// Cancel the poll task and wait for it to finish
    pub async fn stop(&self) {
        let poller = lock(&self.inner.poller).take();
        let Some(poller) = poller else {
            return;
        };

        let _ = poller.shutdown_tx.send(true);
        let mut handle = poller.handle;
        match tokio::time::timeout(STOP_TIMEOUT, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_cancelled() => {}
            Ok(Err(e)) => warn!("Poll loop ended abnormally: {}", e),
            Err(_) => {
                warn!("Poll loop did not stop within {:?}, aborting", STOP_TIMEOUT);
                handle.abort();
            }
        }
        info!("Poll loop stopped");
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.poller).is_some()
    }

    /// Wait for every dispatched fetch and comment flush to complete
    pub async fn settle(&self) {
        loop {
            let handles = std::mem::take(&mut *lock(&self.inner.pending));
            if handles.is_empty() {
                break;
            }
            for result in futures::future::join_all(handles).await {
                if let Err(e) = result {
                    warn!("Background request task failed: {}", e);
                }
            }
        }
    }

    /// Forget the local session model
    ///
    /// Every in-flight completion becomes stale and is discarded on arrival.
    pub async fn reset(&self) {
        self.inner.tokens.supersede_all();
        *self.inner.state.write().await = SyncState::new();
        info!("Local session model reset");
    }

    // ========================================
    // Internal helpers
    // ========================================

    pub(crate) fn spawn_tracked<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        let mut pending = lock(&self.inner.pending);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    pub(crate) fn emit(&self, event: SyncEvent) {
        self.inner.events.emit_lossy(event);
    }

    pub(crate) fn emit_reload_required(&self, class: CounterClass) {
        self.emit(SyncEvent::ReloadRequired {
            class,
            timestamp: time::now(),
        });
    }

    pub(crate) async fn require_permission(&self, action: UserAction) -> Result<()> {
        let state = self.session_state().await;
        if permits(state, action) {
            Ok(())
        } else {
            Err(Error::Rejected(format!(
                "{:?} is not allowed in state {}",
                action, state
            )))
        }
    }
}
