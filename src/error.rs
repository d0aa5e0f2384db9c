//! Error types for the rigbridge library.

use thiserror::Error;

/// The main error type for bridge operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serial port error.
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload could not be encoded for the device.
    #[error("encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// Link is not open.
    #[error("not connected")]
    NotConnected,
}

/// Reasons a recognised frame span was discarded.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The span between the marker and the closing brace is not valid JSON.
    #[error("undecodable frame: {0}")]
    Decode(#[from] serde_json::Error),

    /// The span decoded but lacks a required field.
    #[error("frame missing required field `{0}`")]
    MissingField(&'static str),
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;
