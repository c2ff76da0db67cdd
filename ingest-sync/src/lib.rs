//! # Ingest Session Sync (ingest-sync)
//!
//! Client-side synchronization engine for tape ingest sessions.
//!
//! **Purpose:** Keep a local model of the recorder's session (state, item
//! list, clip marks, comments, cache contents) consistent with the server by
//! polling a cheap status payload and refetching only resources whose change
//! counter moved. Local edits are applied optimistically and confirmed by the
//! echoed counter.
//!
//! **Architecture:** `SyncEngine` owns the model and drives a `RemoteApi`
//! (HTTP via reqwest in production); the presentation side reads
//! `SessionSnapshot`s and subscribes to `SyncEvent`s.

pub mod api;
pub mod counters;
pub mod engine;
pub mod error;
pub mod gate;
pub mod items;
pub mod session;
pub mod state;

pub use api::{HttpApi, RemoteApi};
pub use engine::{
    ActionOutcome, Conflict, EngineConfig, ItemMutation, MutationOutcome, SyncEngine, TickOutcome,
};
pub use error::{Error, Result};
pub use state::SessionSnapshot;
