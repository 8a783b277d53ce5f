//! Error types for concentrator transport operations

use thiserror::Error;

/// Errors produced by the MCU-bridge transport.
#[derive(Debug, Error)]
pub enum ComError {
    /// Caller passed an argument the protocol cannot encode
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Serial device path could not be opened
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: serialport::Error,
    },

    /// Terminal attribute get/set failed
    #[error("link configuration failed: {0}")]
    Config(String),

    /// MCU firmware does not match the version this driver was built for
    #[error("MCU firmware version mismatch (expected {expected}, got {got})")]
    VersionMismatch { expected: String, got: String },

    /// Concentrator reset sequence failed
    #[error("concentrator reset failed: {0}")]
    Reset(String),

    /// MCU transfer failed for a register operation
    #[error("MCU transfer failed")]
    Transfer,

    /// OS close reported failure; the descriptor is released regardless
    #[error("serial port closed with error: {0}")]
    Close(std::io::Error),

    /// Link-level I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for transport operations
pub type Result<T> = core::result::Result<T, ComError>;
