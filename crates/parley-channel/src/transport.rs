//! Socket capability injected into the supervisor.
//!
//! The supervisor never touches a concrete WebSocket. It asks a [`Connector`]
//! for a [`Socket`] and receives [`SocketEvent`]s through a [`SocketEvents`]
//! sink. [`crate::ws::WsConnector`] is the production implementation; tests
//! substitute a fake.

use std::fmt;
use std::sync::Arc;

use crate::errors::TransportError;

/// What to connect to.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Full channel URL.
    pub url: String,
    /// Session token, sent out-of-band during the handshake.
    pub auth_token: Option<String>,
}

impl ConnectRequest {
    /// Create a request.
    pub fn new(url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            url: url.into(),
            auth_token,
        }
    }
}

// Tokens never reach the logs.
impl fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("url", &self.url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Event reported by a socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketEvent {
    /// The handshake completed.
    Opened,
    /// The socket failed or the peer closed it.
    Error(String),
    /// A text frame arrived.
    Frame(String),
}

/// Sink a socket reports its events to.
#[derive(Clone)]
pub struct SocketEvents {
    sink: Arc<dyn Fn(SocketEvent) + Send + Sync>,
}

impl SocketEvents {
    /// Wrap a callback.
    pub fn new(sink: impl Fn(SocketEvent) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Report an event.
    pub fn emit(&self, event: SocketEvent) {
        (self.sink)(event);
    }
}

impl fmt::Debug for SocketEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketEvents").finish_non_exhaustive()
    }
}

/// An established (or establishing) socket.
pub trait Socket: Send + Sync {
    /// Queue a text frame. An error means the frame will never be written.
    fn send(&self, text: String) -> Result<(), TransportError>;
    /// Close the socket. Idempotent. No events are reported afterwards.
    fn close(&self);
}

/// Socket factory.
pub trait Connector: Send + Sync {
    /// Start connecting.
    ///
    /// Implementations must not call into `events` before returning: the
    /// supervisor holds its session lock for the duration of this call.
    fn connect(
        &self,
        request: ConnectRequest,
        events: SocketEvents,
    ) -> Result<Box<dyn Socket>, TransportError>;
}
