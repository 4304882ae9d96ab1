//! Wire envelope and link status types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::STATUS_OK;

// ─────────────────────────────────────────────────────────────────────────────
// OperationType
// ─────────────────────────────────────────────────────────────────────────────

/// Discriminant of a business frame. Determines the shape of `data`.
///
/// Unknown names round-trip through [`OperationType::Other`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationType {
    /// Liveness frame. Only ever sent bare, never inside an envelope.
    Heartbeat,
    /// Chat: messages marked read.
    Read,
    /// Chat: a new message.
    Send,
    /// Memo: content appended.
    Append,
    /// Memo: content replaced.
    Replace,
    /// Any other operation name.
    Other(String),
}

impl OperationType {
    /// Wire name of the operation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::Read => "read",
            Self::Send => "send",
            Self::Append => "append",
            Self::Replace => "replace",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for OperationType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "heartbeat" => Self::Heartbeat,
            "read" => Self::Read,
            "send" => Self::Send,
            "append" => Self::Append,
            "replace" => Self::Replace,
            _ => Self::Other(value),
        }
    }
}

impl Default for OperationType {
    /// Rejection frames may omit the operation; they decode to an empty name.
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<&str> for OperationType {
    fn from(value: &str) -> Self {
        Self::from(value.to_owned())
    }
}

impl From<OperationType> for String {
    fn from(value: OperationType) -> Self {
        match value {
            OperationType::Other(name) => name,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Envelope
// ─────────────────────────────────────────────────────────────────────────────

/// Structured shape of every non-heartbeat frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T = Value> {
    /// HTTP-like status. `200` for business frames.
    pub status: u16,
    /// Operation discriminant.
    #[serde(default)]
    pub operation_type: OperationType,
    /// Operation payload. Rejections may omit it.
    #[serde(default)]
    pub data: T,
    /// Optional server message, set on rejections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    /// Build a successful envelope for an outbound business frame.
    pub fn new(operation_type: OperationType, data: T) -> Self {
        Self {
            status: STATUS_OK,
            operation_type,
            data,
            message: None,
        }
    }

    /// Whether the envelope carries a success status.
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

impl Envelope<Value> {
    /// Server-supplied message: the top-level `message`, else `data.message`.
    pub fn server_message(&self) -> Option<String> {
        self.message.clone().or_else(|| {
            self.data
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
    }

    /// Deserialize `data` into the shape implied by the operation type.
    pub fn data_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Link status
// ─────────────────────────────────────────────────────────────────────────────

/// Coarse connectivity of the real-time channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    /// Connection attempt in flight.
    Loading,
    /// Channel open.
    Success,
    /// Channel failed; a fresh attempt is required.
    Failure,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// Link status paired with its human-readable message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInfo {
    /// Current status.
    pub status: LinkStatus,
    /// Message shown next to the status.
    pub message: String,
}

impl LinkInfo {
    /// Create a link info value.
    pub fn new(status: LinkStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl Default for LinkInfo {
    fn default() -> Self {
        Self::new(LinkStatus::Loading, crate::constants::LINK_CONNECTING)
    }
}
