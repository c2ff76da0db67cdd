//! Wire payloads for the recorder status API
//!
//! Every payload is decoded in two steps: serde into a typed struct, then
//! `Validate::validate` for the constraints serde cannot express. Nothing
//! downstream ever sees an unvalidated payload.

use crate::events::{CounterClass, SessionResult, SessionState};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Status protocol version this client understands
pub const PROTOCOL_VERSION: u32 = 1;

/// Sentinel for an unset clip position or duration
pub const UNSET_POSITION: i64 = -1;

fn unset_position() -> i64 {
    UNSET_POSITION
}

/// Post-deserialization validation of a wire payload
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Decode and validate a JSON payload
pub fn decode<T: DeserializeOwned + Validate>(bytes: &[u8]) -> Result<T> {
    let value: T = serde_json::from_slice(bytes)?;
    value.validate()?;
    Ok(value)
}

fn check_counter(name: &str, value: i64) -> Result<()> {
    if value < 0 {
        return Err(Error::Decode(format!("{} must be non-negative, got {}", name, value)));
    }
    Ok(())
}

fn check_position(name: &str, id: i64, value: i64) -> Result<()> {
    if value < UNSET_POSITION {
        return Err(Error::Decode(format!(
            "item {}: {} must be -1 or non-negative, got {}",
            id, name, value
        )));
    }
    Ok(())
}

// ========================================
// Status
// ========================================

/// Per-session details carried by the status payload while a session exists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Barcode / spool number of the source tape
    pub source_spool: String,
    #[serde(default)]
    pub item_count: usize,
    /// Recorded duration so far (server time units)
    #[serde(default)]
    pub duration: i64,
}

/// Aggregate session status returned by `GET /api/status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub version: u32,
    pub state: SessionState,
    #[serde(default)]
    pub item_order_counter: Option<i64>,
    #[serde(default)]
    pub item_clip_counter: Option<i64>,
    #[serde(default)]
    pub comments_counter: Option<i64>,
    #[serde(default)]
    pub cache_counter: Option<i64>,
    #[serde(default)]
    pub last_session_result: Option<SessionResult>,
    #[serde(default)]
    pub session: Option<SessionInfo>,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

impl StatusPayload {
    /// Decode a status payload, checking the protocol version before the shape
    ///
    /// A server on another protocol version may send a differently shaped
    /// payload, so the version is probed first and reported as
    /// `Error::ProtocolVersion` rather than a generic decode failure.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let probe: VersionProbe = serde_json::from_slice(bytes)?;
        if probe.version != PROTOCOL_VERSION {
            return Err(Error::ProtocolVersion {
                expected: PROTOCOL_VERSION,
                found: probe.version,
            });
        }
        decode(bytes)
    }

    /// Counter value for a resource class, if the status carries one
    pub fn counter(&self, class: CounterClass) -> Option<i64> {
        match class {
            CounterClass::ItemOrder => self.item_order_counter,
            CounterClass::ItemClips => self.item_clip_counter,
            CounterClass::Comments => self.comments_counter,
            CounterClass::CacheContents => self.cache_counter,
        }
    }
}

impl Validate for StatusPayload {
    fn validate(&self) -> Result<()> {
        if self.version != PROTOCOL_VERSION {
            return Err(Error::ProtocolVersion {
                expected: PROTOCOL_VERSION,
                found: self.version,
            });
        }
        if self.state == SessionState::Unknown {
            return Err(Error::Decode("server reported state UNKNOWN".to_string()));
        }
        for class in CounterClass::ALL {
            if let Some(value) = self.counter(class) {
                check_counter(&class.to_string(), value)?;
            }
        }
        Ok(())
    }
}

// ========================================
// Items
// ========================================

/// One programme segment on the source tape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Server-assigned, never reused within a session
    pub id: i64,
    /// Presentation position; only meaningful relative to the current list
    pub index: usize,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default)]
    pub is_junk: bool,
    #[serde(default = "unset_position")]
    pub item_start_position: i64,
    #[serde(default = "unset_position")]
    pub item_duration: i64,
    #[serde(default, rename = "progTitle")]
    pub programme_title: Option<String>,
    #[serde(default)]
    pub episode_title: Option<String>,
    #[serde(default)]
    pub start_timecode: Option<String>,
    #[serde(default)]
    pub duration_timecode: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
}

impl Item {
    /// Create an enabled item with unset clip marks
    pub fn new(id: i64, index: usize) -> Self {
        Self {
            id,
            index,
            is_disabled: false,
            is_junk: false,
            item_start_position: UNSET_POSITION,
            item_duration: UNSET_POSITION,
            programme_title: None,
            episode_title: None,
            start_timecode: None,
            duration_timecode: None,
            aspect_ratio: None,
        }
    }

    /// Both start position and duration are set
    pub fn is_marked(&self) -> bool {
        self.item_start_position != UNSET_POSITION && self.item_duration != UNSET_POSITION
    }
}

/// Check the ordering invariant over a presentation-ordered item slice
///
/// Ids are unique, `index` equals the slice position, and every enabled item
/// precedes every disabled one.
pub fn check_item_order(items: &[Item]) -> Result<()> {
    let mut ids = HashSet::with_capacity(items.len());
    let mut seen_disabled = false;
    for (position, item) in items.iter().enumerate() {
        if !ids.insert(item.id) {
            return Err(Error::Decode(format!("duplicate item id {}", item.id)));
        }
        if item.index != position {
            return Err(Error::Decode(format!(
                "item {} has index {} at position {}",
                item.id, item.index, position
            )));
        }
        if item.is_disabled {
            seen_disabled = true;
        } else if seen_disabled {
            return Err(Error::Decode(format!(
                "enabled item {} follows a disabled item",
                item.id
            )));
        }
        check_position("itemStartPosition", item.id, item.item_start_position)?;
        check_position("itemDuration", item.id, item.item_duration)?;
    }
    Ok(())
}

/// Full item list returned by `GET /api/items`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemListPayload {
    pub items: Vec<Item>,
    pub item_order_counter: i64,
}

impl Validate for ItemListPayload {
    fn validate(&self) -> Result<()> {
        check_counter("itemOrderCounter", self.item_order_counter)?;
        check_item_order(&self.items)
    }
}

// ========================================
// Clip marks
// ========================================

/// Clip boundaries of one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipMark {
    pub id: i64,
    pub item_start_position: i64,
    pub item_duration: i64,
}

/// Clip marks returned by `GET /api/items/clips`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipMarksPayload {
    pub marks: Vec<ClipMark>,
    pub item_clip_counter: i64,
}

impl Validate for ClipMarksPayload {
    fn validate(&self) -> Result<()> {
        check_counter("itemClipCounter", self.item_clip_counter)?;
        let mut ids = HashSet::with_capacity(self.marks.len());
        for mark in &self.marks {
            if !ids.insert(mark.id) {
                return Err(Error::Decode(format!("duplicate clip mark for item {}", mark.id)));
            }
            check_position("itemStartPosition", mark.id, mark.item_start_position)?;
            check_position("itemDuration", mark.id, mark.item_duration)?;
        }
        Ok(())
    }
}

// ========================================
// Comments
// ========================================

/// Session comments returned by `GET /api/comments`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentsPayload {
    #[serde(default)]
    pub text: String,
    pub comments_counter: i64,
}

impl Validate for CommentsPayload {
    fn validate(&self) -> Result<()> {
        check_counter("commentsCounter", self.comments_counter)
    }
}

/// Body of `POST /api/comments`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentsRequest {
    pub text: String,
}

// ========================================
// Cache
// ========================================

/// One ingested file in the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub name: String,
    /// Size in bytes
    pub size: u64,
    #[serde(default)]
    pub ingested_at: Option<String>,
}

/// Cache listing returned by `GET /api/cache`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheContentsPayload {
    pub entries: Vec<CacheEntry>,
    pub cache_counter: i64,
}

impl Validate for CacheContentsPayload {
    fn validate(&self) -> Result<()> {
        check_counter("cacheCounter", self.cache_counter)?;
        if let Some(entry) = self.entries.iter().find(|e| e.name.trim().is_empty()) {
            return Err(Error::Decode(format!(
                "cache entry with empty name (size {})",
                entry.size
            )));
        }
        Ok(())
    }
}

// ========================================
// Mutations
// ========================================

/// Body of the item move/enable/disable endpoints
///
/// `index` is the position the client believes the item occupies; the server
/// uses it only to detect a stale client view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMutationRequest {
    pub index: usize,
}

/// Item-order counter echoed after a move/enable/disable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOrderEcho {
    pub item_order_counter: i64,
}

impl Validate for ItemOrderEcho {
    fn validate(&self) -> Result<()> {
        check_counter("itemOrderCounter", self.item_order_counter)
    }
}

/// Clip counter echoed after a boundary mark/clear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemClipEcho {
    pub item_clip_counter: i64,
}

impl Validate for ItemClipEcho {
    fn validate(&self) -> Result<()> {
        check_counter("itemClipCounter", self.item_clip_counter)
    }
}

/// Comments counter echoed after a save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentsEcho {
    pub comments_counter: i64,
}

impl Validate for CommentsEcho {
    fn validate(&self) -> Result<()> {
        check_counter("commentsCounter", self.comments_counter)
    }
}

// ========================================
// Session actions
// ========================================

/// Session lifecycle actions (`POST /api/session/{action}`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionAction {
    Start,
    Stop,
    Abort,
    Complete,
    Chunk,
}

impl SessionAction {
    /// URL path segment
    pub fn path(self) -> &'static str {
        match self {
            SessionAction::Start => "start",
            SessionAction::Stop => "stop",
            SessionAction::Abort => "abort",
            SessionAction::Complete => "complete",
            SessionAction::Chunk => "chunk",
        }
    }
}

impl std::fmt::Display for SessionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Acknowledgement of a session action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionAck {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Validate for ActionAck {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

// ========================================
// Tests
// ========================================
