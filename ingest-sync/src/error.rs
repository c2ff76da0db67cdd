//! Error types for ingest-sync
//!
//! Every failure the engine can meet maps onto one of the recovery classes:
//! transport / decode / version / conflict all degrade and wait for the next
//! poll, `Rejected` is a synchronous business-rule refusal.

use thiserror::Error;

/// Main error type for the sync engine
#[derive(Error, Debug)]
pub enum Error {
    /// Network failure, timeout or connection refused
    #[error("Transport error: {0}")]
    Transport(String),

    /// Server answered with a non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Malformed or invalid server payload
    #[error("Decode error: {0}")]
    Decode(String),

    /// Server speaks another status protocol version
    #[error("Protocol version mismatch: expected {expected}, found {found}")]
    ProtocolVersion { expected: u32, found: u32 },

    /// Action refused locally (precondition or session state)
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Local model cannot take the requested transform
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ingest_common::Error> for Error {
    fn from(e: ingest_common::Error) -> Self {
        match e {
            ingest_common::Error::Io(e) => Error::Io(e),
            ingest_common::Error::Config(msg) => Error::Config(msg),
            ingest_common::Error::Decode(msg) => Error::Decode(msg),
            ingest_common::Error::ProtocolVersion { expected, found } => {
                Error::ProtocolVersion { expected, found }
            }
            ingest_common::Error::InvalidInput(msg) => Error::Rejected(msg),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::Decode(e.to_string())
        } else {
            Error::Transport(e.to_string())
        }
    }
}

/// Convenience Result type using the ingest-sync Error
pub type Result<T> = std::result::Result<T, Error>;
