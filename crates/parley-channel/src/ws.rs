//! WebSocket transport over `tokio-tungstenite`.
//!
//! The session token travels in the `Sec-WebSocket-Protocol` handshake header,
//! never inside a frame. Each socket runs as one spawned task that owns the
//! stream, reads outbound frames from an unbounded queue and reports
//! [`SocketEvent`]s back to the supervisor.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::TransportError;
use crate::transport::{ConnectRequest, Connector, Socket, SocketEvent, SocketEvents};

/// Production [`Connector`]. Must be used from within a tokio runtime.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(
        &self,
        request: ConnectRequest,
        events: SocketEvents,
    ) -> Result<Box<dyn Socket>, TransportError> {
        let handshake = build_request(&request)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        drop(runtime.spawn(run_socket(handshake, rx, cancel.clone(), events)));

        Ok(Box::new(WsSocket { tx, cancel }))
    }
}

/// Build the handshake request, attaching the token as the subprotocol.
pub fn build_request(request: &ConnectRequest) -> Result<Request, TransportError> {
    let mut handshake = request
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| TransportError::Connect(format!("invalid channel url: {e}")))?;

    if let Some(token) = &request.auth_token {
        let value = HeaderValue::from_str(token)
            .map_err(|_| TransportError::Connect("token is not a valid header value".into()))?;
        let _ = handshake.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
    }
    Ok(handshake)
}

struct WsSocket {
    tx: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl Socket for WsSocket {
    fn send(&self, text: String) -> Result<(), TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Closed);
        }
        self.tx.send(text).map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        self.cancel.cancel();
    }
}

async fn run_socket(
    handshake: Request,
    mut outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
    events: SocketEvents,
) {
    let connected = tokio::select! {
        result = connect_async(handshake) => result,
        () = cancel.cancelled() => return,
    };
    let ws = match connected {
        Ok((ws, _response)) => ws,
        Err(e) => {
            warn!(error = %e, "channel handshake failed");
            if !cancel.is_cancelled() {
                events.emit(SocketEvent::Error(e.to_string()));
            }
            return;
        }
    };
    if cancel.is_cancelled() {
        return;
    }
    events.emit(SocketEvent::Opened);

    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                debug!("channel socket closed locally");
                break;
            }
            frame = outbound.recv() => {
                let Some(text) = frame else { break };
                if let Err(e) = sink.send(Message::text(text)).await {
                    if !cancel.is_cancelled() {
                        events.emit(SocketEvent::Error(e.to_string()));
                    }
                    break;
                }
            }
            message = stream.next() => {
                if cancel.is_cancelled() {
                    break;
                }
                match message {
                    Some(Ok(Message::Text(text))) => {
                        events.emit(SocketEvent::Frame(text.as_str().to_owned()));
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        events.emit(SocketEvent::Error("connection closed by server".into()));
                        break;
                    }
                    // Control and binary frames carry nothing for the channel.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        events.emit(SocketEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
        }
    }
}
