//! # parley-core
//!
//! Foundation types and capabilities shared by the Parley channel and request
//! layers:
//!
//! - **Envelope**: `Envelope<T>` wire shape, `OperationType`, `LinkStatus`
//! - **Codec**: heartbeat sentinel detection and envelope (de)serialization
//! - **Clock**: schedulable, cancelable timers (`TokioClock`, `ManualClock`)
//! - **Ports**: `Navigator`, `Notifier`, `ConnectivityProbe` and `Route`
//! - **Credentials**: `CredentialStore` with memory and file backends
//! - **Auth**: `AuthExpiry`, the shared "clear credentials and go to login" action
//! - **Logging**: `tracing` subscriber setup and log capture for tests

#![deny(unsafe_code)]

pub mod auth;
pub mod clock;
pub mod codec;
pub mod constants;
pub mod credentials;
pub mod envelope;
pub mod errors;
pub mod logging;
pub mod ports;
pub mod testing;

pub use auth::AuthExpiry;
pub use clock::{Clock, ManualClock, TimerCallback, TimerHandle, TokioClock};
pub use codec::{InboundFrame, OutboundFrame};
pub use credentials::{CredentialStore, Credentials, FileCredentialStore, MemoryCredentialStore};
pub use envelope::{Envelope, LinkInfo, LinkStatus, OperationType};
pub use errors::{CodecError, CredentialError};
pub use ports::{
    AlwaysOnline, ConnectivityFlag, ConnectivityProbe, HistoryNavigator, Navigator, Notifier,
    Route, TracingNotifier,
};
