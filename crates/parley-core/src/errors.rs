//! Error types for the codec and credential storage.

use thiserror::Error;

/// Errors raised while decoding or encoding channel frames.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame was neither the heartbeat sentinel nor a valid envelope.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),
    /// An outbound envelope could not be serialized.
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Errors raised by persistent credential stores.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
