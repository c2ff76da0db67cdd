//! Common error types for the ingest tools

use thiserror::Error;

/// Common result type for ingest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the ingest crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server payload could not be decoded or failed validation
    #[error("Decode error: {0}")]
    Decode(String),

    /// Server speaks a different status protocol version
    #[error("Protocol version mismatch: expected {expected}, found {found}")]
    ProtocolVersion { expected: u32, found: u32 },

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}
