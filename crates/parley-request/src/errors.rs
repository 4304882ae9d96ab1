//! Request error taxonomy.

use serde_json::Value;
use thiserror::Error;

/// Why a business request did not produce a value.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RequestError {
    /// The connectivity precheck failed; the call was never attempted.
    #[error("network unavailable")]
    Offline,
    /// The call was cancelled through its abort epoch.
    #[error("request cancelled")]
    Cancelled,
    /// The request never reached the server (connection refused, reset).
    #[error("network error: {0}")]
    Network(String),
    /// No usable response: timeout, unreadable body, malformed request.
    #[error("no response: {0}")]
    NoResponse(String),
    /// The server answered with a non-success status.
    #[error("server responded with status {status}")]
    Response {
        /// HTTP status code.
        status: u16,
        /// `message` field of the error body, if any.
        message: Option<String>,
        /// Parsed error body, if it was JSON.
        body: Option<Value>,
    },
}

impl RequestError {
    /// Status code for [`RequestError::Response`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the call was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Server-provided message for [`RequestError::Response`].
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Response { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Build a response error from a status and a raw body.
    pub fn from_response(status: u16, body: Option<Value>) -> Self {
        let message = body
            .as_ref()
            .and_then(|b| b.get("message"))
            .and_then(Value::as_str)
            .map(str::to_owned);
        Self::Response {
            status,
            message,
            body,
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Self::Response {
                status: status.as_u16(),
                message: None,
                body: None,
            }
        } else if err.is_timeout() {
            Self::NoResponse(err.to_string())
        } else if err.is_connect() || err.is_request() {
            Self::Network(err.to_string())
        } else {
            Self::NoResponse(err.to_string())
        }
    }
}
