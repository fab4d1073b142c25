//! Error types for the control client
//!
//! Only failures that stop an operation from producing an [`Outcome`] live
//! here. Remote-reported failures, malformed responses and unrecovered
//! transport failures are values of `Outcome` instead, so callers can render
//! them without special-casing.
//!
//! [`Outcome`]: crate::control::Outcome

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the control client
#[derive(Error, Debug)]
pub enum Error {
    // === Connection Errors ===
    #[error("Failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Timed out connecting to {addr} after {secs} seconds")]
    ConnectTimeout { addr: String, secs: u64 },

    #[error("Not connected to the engine. Use 'connect' first")]
    NotConnected,

    // === Transport Errors ===
    #[error("Connection closed by peer")]
    TransportClosed,

    #[error("No response within {0:?}")]
    ResponseTimeout(Duration),

    #[error("Line exceeds maximum length of {0} bytes")]
    LineTooLong(usize),

    #[error("Invalid line: {0}")]
    InvalidLine(String),

    // === Test Plan Errors ===
    #[error("Unknown tier '{0}'. Expected one of: safe, regular, full")]
    UnknownTier(String),

    // === Console Errors ===
    #[error("{0}")]
    InvalidCommand(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a connect failure for the given address
    pub fn connect_failed(addr: impl Into<String>, source: io::Error) -> Self {
        Self::ConnectFailed {
            addr: addr.into(),
            source,
        }
    }

    /// Whether this error means the stream is unusable
    ///
    /// These are the failures the session recovers from by reconnecting.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::TransportClosed
                | Error::ResponseTimeout(_)
                | Error::LineTooLong(_)
                | Error::Io(_)
        )
    }

    /// Whether this error happened while establishing a connection
    pub fn is_connect(&self) -> bool {
        matches!(self, Error::ConnectFailed { .. } | Error::ConnectTimeout { .. })
    }
}
