//! # parley-channel
//!
//! Supervises the client's long-lived real-time channel.
//!
//! - **Machine**: pure `transition(state, event) -> (next, effects)`
//! - **Supervisor**: applies effects, owns the socket and both timers
//!   (liveness deadline, heartbeat)
//! - **Transport**: `Connector`/`Socket` capability, with the
//!   `tokio-tungstenite` implementation in [`ws`]
//! - **Registry**: envelope handlers keyed by operation type
//! - **Link**: observable link status

#![deny(unsafe_code)]

pub mod errors;
pub mod link;
pub mod machine;
pub mod registry;
pub mod supervisor;
pub mod transport;
pub mod ws;

pub use errors::{ChannelError, FailureCause, TransportError};
pub use link::LinkMonitor;
pub use machine::{ChannelEvent, ChannelState, CloseKind, Effect, Transition, transition};
pub use registry::{EnvelopeHandler, HandlerRegistry};
pub use supervisor::{ChannelSupervisor, ChannelSupervisorBuilder, ChannelTiming};
pub use transport::{ConnectRequest, Connector, Socket, SocketEvent, SocketEvents};
pub use ws::WsConnector;
