//! Scripted recorder for engine tests
//!
//! `FakeApi` answers every `RemoteApi` call from programmable state, counts
//! calls per operation and can hold any operation open until released.

#![allow(dead_code)]

use async_trait::async_trait;
use ingest_common::api::{
    ActionAck, CacheContentsPayload, CacheEntry, ClipMark, ClipMarksPayload, CommentsEcho,
    CommentsPayload, Item, ItemClipEcho, ItemListPayload, ItemOrderEcho, SessionAction,
    SessionInfo, StatusPayload, PROTOCOL_VERSION,
};
use ingest_common::SessionState;
use ingest_sync::{EngineConfig, Error, RemoteApi, Result, SyncEngine};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const STATUS: &str = "status";
pub const ITEM_LIST: &str = "item_list";
pub const CLIP_MARKS: &str = "clip_marks";
pub const COMMENTS: &str = "comments";
pub const CACHE: &str = "cache";
pub const MOVE_UP: &str = "move_up";
pub const MOVE_DOWN: &str = "move_down";
pub const ENABLE: &str = "enable";
pub const DISABLE: &str = "disable";
pub const MARK: &str = "mark";
pub const CLEAR: &str = "clear";
pub const SAVE_COMMENTS: &str = "save_comments";
pub const SESSION_ACTION: &str = "session_action";

#[derive(Default)]
struct Script {
    status: Option<StatusPayload>,
    items: Vec<Item>,
    item_order_counter: i64,
    marks: Vec<ClipMark>,
    item_clip_counter: i64,
    comments: String,
    comments_counter: i64,
    cache: Vec<CacheEntry>,
    cache_counter: i64,
    /// Echoes returned by the next item mutations, in order
    order_echoes: VecDeque<i64>,
    comment_echoes: VecDeque<i64>,
    failing: HashMap<&'static str, String>,
    action_ack: Option<ActionAck>,
    calls: HashMap<&'static str, usize>,
    mutations: Vec<(&'static str, i64, usize)>,
    saved_comments: Vec<String>,
    actions: Vec<SessionAction>,
}

#[derive(Default)]
pub struct FakeApi {
    script: Mutex<Script>,
    holds: Mutex<HashMap<&'static str, Arc<Notify>>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // ----- scripting -----

    pub fn set_status(&self, status: StatusPayload) {
        self.script.lock().unwrap().status = Some(status);
    }

    pub fn set_state(&self, state: SessionState) {
        let mut script = self.script.lock().unwrap();
        let current = script.status.get_or_insert_with(|| status(state));
        current.state = state;
    }

    pub fn set_status_counter_order(&self, value: i64) {
        let mut script = self.script.lock().unwrap();
        if let Some(status) = script.status.as_mut() {
            status.item_order_counter = Some(value);
        }
    }

    pub fn set_items(&self, items: Vec<Item>, counter: i64) {
        let mut script = self.script.lock().unwrap();
        script.items = items;
        script.item_order_counter = counter;
    }

    pub fn set_clip_marks(&self, marks: Vec<ClipMark>, counter: i64) {
        let mut script = self.script.lock().unwrap();
        script.marks = marks;
        script.item_clip_counter = counter;
    }

    pub fn set_comments(&self, text: &str, counter: i64) {
        let mut script = self.script.lock().unwrap();
        script.comments = text.to_string();
        script.comments_counter = counter;
    }

    pub fn set_cache(&self, entries: Vec<CacheEntry>, counter: i64) {
        let mut script = self.script.lock().unwrap();
        script.cache = entries;
        script.cache_counter = counter;
    }

    /// Echo returned by the next item mutation
    pub fn push_order_echo(&self, counter: i64) {
        self.script.lock().unwrap().order_echoes.push_back(counter);
    }

    pub fn push_comment_echo(&self, counter: i64) {
        self.script.lock().unwrap().comment_echoes.push_back(counter);
    }

    pub fn set_action_ack(&self, ack: ActionAck) {
        self.script.lock().unwrap().action_ack = Some(ack);
    }

    /// Make `op` fail with a transport error until `recover` is called
    pub fn fail(&self, op: &'static str) {
        self.script
            .lock()
            .unwrap()
            .failing
            .insert(op, format!("{} unreachable", op));
    }

    pub fn recover(&self, op: &'static str) {
        self.script.lock().unwrap().failing.remove(op);
    }

    /// Hold every call of `op` until the returned Notify is signalled
    pub fn hold(&self, op: &'static str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.holds.lock().unwrap().insert(op, notify.clone());
        notify
    }

    pub fn unhold(&self, op: &'static str) {
        self.holds.lock().unwrap().remove(op);
    }

    // ----- inspection -----

    pub fn calls(&self, op: &'static str) -> usize {
        self.script
            .lock()
            .unwrap()
            .calls
            .get(op)
            .copied()
            .unwrap_or(0)
    }

    pub fn mutations(&self) -> Vec<(&'static str, i64, usize)> {
        self.script.lock().unwrap().mutations.clone()
    }

    pub fn saved_comments(&self) -> Vec<String> {
        self.script.lock().unwrap().saved_comments.clone()
    }

    pub fn actions(&self) -> Vec<SessionAction> {
        self.script.lock().unwrap().actions.clone()
    }

    /// Wait until `op` has been called at least `n` times
    pub async fn wait_for_calls(&self, op: &'static str, n: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.calls(op) < n {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("{} was not called {} times", op, n));
    }

    // ----- internals -----

    async fn enter(&self, op: &'static str) -> Result<()> {
        let failure = {
            let mut script = self.script.lock().unwrap();
            *script.calls.entry(op).or_insert(0) += 1;
            script.failing.get(op).cloned()
        };

        let hold = self.holds.lock().unwrap().get(op).cloned();
        if let Some(notify) = hold {
            notify.notified().await;
        }

        match failure {
            Some(reason) => Err(Error::Transport(reason)),
            None => Ok(()),
        }
    }

    async fn mutate(&self, op: &'static str, id: i64, index: usize) -> Result<ItemOrderEcho> {
        self.script.lock().unwrap().mutations.push((op, id, index));
        self.enter(op).await?;
        let mut script = self.script.lock().unwrap();
        let counter = match script.order_echoes.pop_front() {
            Some(counter) => counter,
            None => script.item_order_counter + 1,
        };
        script.item_order_counter = counter;
        Ok(ItemOrderEcho {
            item_order_counter: counter,
        })
    }
}

#[async_trait]
impl RemoteApi for FakeApi {
    async fn fetch_status(&self) -> Result<StatusPayload> {
        self.enter(STATUS).await?;
        self.script
            .lock()
            .unwrap()
            .status
            .clone()
            .ok_or_else(|| Error::Transport("no status scripted".to_string()))
    }

    async fn fetch_item_list(&self) -> Result<ItemListPayload> {
        self.enter(ITEM_LIST).await?;
        let script = self.script.lock().unwrap();
        Ok(ItemListPayload {
            items: script.items.clone(),
            item_order_counter: script.item_order_counter,
        })
    }

    async fn fetch_clip_marks(&self) -> Result<ClipMarksPayload> {
        self.enter(CLIP_MARKS).await?;
        let script = self.script.lock().unwrap();
        Ok(ClipMarksPayload {
            marks: script.marks.clone(),
            item_clip_counter: script.item_clip_counter,
        })
    }

    async fn fetch_comments(&self) -> Result<CommentsPayload> {
        self.enter(COMMENTS).await?;
        let script = self.script.lock().unwrap();
        Ok(CommentsPayload {
            text: script.comments.clone(),
            comments_counter: script.comments_counter,
        })
    }

    async fn fetch_cache_contents(&self) -> Result<CacheContentsPayload> {
        self.enter(CACHE).await?;
        let script = self.script.lock().unwrap();
        Ok(CacheContentsPayload {
            entries: script.cache.clone(),
            cache_counter: script.cache_counter,
        })
    }

    async fn move_item_up(&self, id: i64, index: usize) -> Result<ItemOrderEcho> {
        self.mutate(MOVE_UP, id, index).await
    }

    async fn move_item_down(&self, id: i64, index: usize) -> Result<ItemOrderEcho> {
        self.mutate(MOVE_DOWN, id, index).await
    }

    async fn enable_item(&self, id: i64, index: usize) -> Result<ItemOrderEcho> {
        self.mutate(ENABLE, id, index).await
    }

    async fn disable_item(&self, id: i64, index: usize) -> Result<ItemOrderEcho> {
        self.mutate(DISABLE, id, index).await
    }

    async fn mark_item_boundary(&self) -> Result<ItemClipEcho> {
        self.enter(MARK).await?;
        let mut script = self.script.lock().unwrap();
        script.item_clip_counter += 1;
        Ok(ItemClipEcho {
            item_clip_counter: script.item_clip_counter,
        })
    }

    async fn clear_item_boundary(&self) -> Result<ItemClipEcho> {
        self.enter(CLEAR).await?;
        let mut script = self.script.lock().unwrap();
        script.item_clip_counter += 1;
        Ok(ItemClipEcho {
            item_clip_counter: script.item_clip_counter,
        })
    }

    async fn save_comments(&self, text: &str) -> Result<CommentsEcho> {
        self.script
            .lock()
            .unwrap()
            .saved_comments
            .push(text.to_string());
        self.enter(SAVE_COMMENTS).await?;
        let mut script = self.script.lock().unwrap();
        let counter = match script.comment_echoes.pop_front() {
            Some(counter) => counter,
            None => script.comments_counter + 1,
        };
        script.comments_counter = counter;
        script.comments = text.to_string();
        Ok(CommentsEcho {
            comments_counter: counter,
        })
    }

    async fn session_action(&self, action: SessionAction) -> Result<ActionAck> {
        self.script.lock().unwrap().actions.push(action);
        self.enter(SESSION_ACTION).await?;
        Ok(self
            .script
            .lock()
            .unwrap()
            .action_ack
            .clone()
            .unwrap_or(ActionAck {
                ok: true,
                message: None,
            }))
    }
}

// ----- fixtures -----

pub fn status(state: SessionState) -> StatusPayload {
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

/// Status carrying every counter
pub fn status_with_counters(state: SessionState, order: i64, clips: i64, comments: i64) -> StatusPayload {
    StatusPayload {
        item_order_counter: Some(order),
        item_clip_counter: Some(clips),
        comments_counter: Some(comments),
        cache_counter: Some(0),
        session: Some(SessionInfo {
            source_spool: "SPOOL-001".to_string(),
            item_count: 0,
            duration: 0,
        }),
        ..status(state)
    }
}

/// Enabled items followed by disabled ones, ids from 1
pub fn items(enabled: usize, disabled: usize) -> Vec<Item> {
    (0..enabled + disabled)
        .map(|index| {
            let mut item = Item::new(index as i64 + 1, index);
            item.is_disabled = index >= enabled;
            if !item.is_disabled {
                item.item_start_position = (index as i64) * 1000;
                item.item_duration = 900;
            }
            item
        })
        .collect()
}

pub fn engine(api: Arc<FakeApi>) -> SyncEngine {
    engine_with(api, false)
}

pub fn engine_with(api: Arc<FakeApi>, track_cache: bool) -> SyncEngine {
    SyncEngine::new(
        api,
        EngineConfig {
            poll_interval: Duration::from_millis(10),
            track_cache,
            event_capacity: 256,
        },
    )
}

/// Engine with a loaded item list in `state`
pub async fn loaded_engine(
    api: &Arc<FakeApi>,
    state: SessionState,
    items: Vec<Item>,
    order_counter: i64,
) -> SyncEngine {
    api.set_items(items, order_counter);
    api.set_status(status_with_counters(state, order_counter, 0, 0));
    let engine = engine(api.clone());
    // Clip marks follow once the item list is current
    for _ in 0..2 {
        engine.tick().await.unwrap();
        engine.settle().await;
    }
    engine
}

/// Everything emitted so far
pub fn drain(rx: &mut tokio::sync::broadcast::Receiver<ingest_common::events::SyncEvent>) -> Vec<ingest_common::events::SyncEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
