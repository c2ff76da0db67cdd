//! Session state and change-counter type definitions
//!
//! Supporting types shared between the wire payloads and the event stream.

use serde::{Deserialize, Serialize};

/// Session lifecycle state as reported by the recorder status endpoint
///
/// `Unknown` is never sent by the server; the client enters it whenever the
/// status is unavailable (transport failure, bad payload, version mismatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    NotStarted,
    Ready,
    Recording,
    Reviewing,
    PrepareChunking,
    Chunking,
    End,
    Unknown,
}

impl SessionState {
    /// Ready, recording, reviewing, preparing-to-chunk and chunking
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Ready
                | SessionState::Recording
                | SessionState::Reviewing
                | SessionState::PrepareChunking
                | SessionState::Chunking
        )
    }

    /// States that accept no user-initiated mutations
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::NotStarted | SessionState::End | SessionState::Unknown
        )
    }

    /// Destination states of the "recording finished" edge
    pub fn is_post_recording(self) -> bool {
        matches!(
            self,
            SessionState::Reviewing | SessionState::PrepareChunking | SessionState::Chunking
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::NotStarted => write!(f, "NOT_STARTED"),
            SessionState::Ready => write!(f, "READY"),
            SessionState::Recording => write!(f, "RECORDING"),
            SessionState::Reviewing => write!(f, "REVIEWING"),
            SessionState::PrepareChunking => write!(f, "PREPARE_CHUNKING"),
            SessionState::Chunking => write!(f, "CHUNKING"),
            SessionState::End => write!(f, "END"),
            SessionState::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Outcome of the last finished session, exposed while in NOT_STARTED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionResult {
    Success,
    Failure,
    Unknown,
}

impl std::fmt::Display for SessionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionResult::Success => write!(f, "success"),
            SessionResult::Failure => write!(f, "failure"),
            SessionResult::Unknown => write!(f, "unknown"),
        }
    }
}

/// Independent server-side revision counters
///
/// Each counter increases by exactly one per accepted mutation to its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CounterClass {
    /// Item membership and ordering
    ItemOrder,
    /// Item clip marks (start position / duration)
    ItemClips,
    /// Session free-text comments
    Comments,
    /// Ingested file cache contents
    CacheContents,
}

impl CounterClass {
    pub const ALL: [CounterClass; 4] = [
        CounterClass::ItemOrder,
        CounterClass::ItemClips,
        CounterClass::Comments,
        CounterClass::CacheContents,
    ];

    /// Slot in fixed-size per-class tables
    pub fn slot(self) -> usize {
        match self {
            CounterClass::ItemOrder => 0,
            CounterClass::ItemClips => 1,
            CounterClass::Comments => 2,
            CounterClass::CacheContents => 3,
        }
    }
}

impl std::fmt::Display for CounterClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CounterClass::ItemOrder => write!(f, "ItemOrder"),
            CounterClass::ItemClips => write!(f, "ItemClips"),
            CounterClass::Comments => write!(f, "Comments"),
            CounterClass::CacheContents => write!(f, "CacheContents"),
        }
    }
}
