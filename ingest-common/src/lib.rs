//! # Ingest Common Library
//!
//! Shared code for the tape ingest operator tools including:
//! - Wire payload types for the recorder status API (typed, validated decode)
//! - Session state and change-counter identifiers
//! - Event types (SyncEvent enum) and the EventBus
//! - Configuration loading
//! - Timestamp helpers

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::{CounterClass, SessionResult, SessionState};
