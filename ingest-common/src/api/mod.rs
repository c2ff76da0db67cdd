//! Recorder API wire types
//!
//! Request/response payloads exchanged with the recorder status service.

pub mod types;

pub use types::*;
