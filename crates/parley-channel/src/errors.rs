//! Channel error types and failure causes.

use std::fmt;

use parley_core::CodecError;
use parley_core::constants::STATUS_UNAUTHORIZED;
use thiserror::Error;

use crate::machine::ChannelState;

/// Errors returned to callers of the channel API.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The operation is not allowed in the current state.
    #[error("cannot {action} while {state}")]
    InvalidState {
        /// State the channel was in.
        state: ChannelState,
        /// Operation that was attempted.
        action: &'static str,
    },
    /// A frame was sent while the channel was not open.
    #[error("channel is not open")]
    NotOpen,
    /// The outbound frame could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The socket rejected the frame. The channel has already failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors raised by a socket implementation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The socket is closed.
    #[error("socket closed")]
    Closed,
    /// The connection could not be started.
    #[error("connect failed: {0}")]
    Connect(String),
    /// The frame could not be written.
    #[error("send failed: {0}")]
    Send(String),
}

/// Why a channel entered `Closed(Failure)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureCause {
    /// The socket reported an error or was closed by the peer.
    SocketError(String),
    /// No frame arrived within the liveness deadline.
    LivenessTimeout,
    /// A frame could not be handed to the socket.
    SendFailed(String),
    /// The server answered with a non-200 envelope.
    ServerRejected {
        /// Envelope status.
        status: u16,
        /// Server-provided message, if any.
        message: Option<String>,
    },
}

impl FailureCause {
    /// Whether the failure means the session is no longer authenticated.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::ServerRejected { status, .. } if *status == STATUS_UNAUTHORIZED)
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SocketError(reason) => write!(f, "socket error: {reason}"),
            Self::LivenessTimeout => f.write_str("liveness deadline elapsed"),
            Self::SendFailed(reason) => write!(f, "send failed: {reason}"),
            Self::ServerRejected {
                status,
                message: Some(message),
            } => write!(f, "server rejected ({status}): {message}"),
            Self::ServerRejected {
                status,
                message: None,
            } => write!(f, "server rejected ({status})"),
        }
    }
}
