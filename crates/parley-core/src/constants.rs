//! Package-level constants: wire sentinels, default timings and user-facing
//! notice texts.

use std::time::Duration;

/// Current version of the Parley client (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "parley";

/// Bare frame exchanged in both directions to keep the channel alive.
pub const HEARTBEAT_SENTINEL: &str = "heartbeat";

/// Status carried by every successful business envelope.
pub const STATUS_OK: u16 = 200;

/// Status signalling an authentication failure.
pub const STATUS_UNAUTHORIZED: u16 = 401;

/// Period between heartbeat sends while the channel is open.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Window after any send within which an inbound frame must arrive.
pub const DEFAULT_LIVENESS_DEADLINE: Duration = Duration::from_secs(5);

/// Delay before the busy indicator hides after the last holder released it.
pub const DEFAULT_BUSY_GRACE: Duration = Duration::from_millis(100);

/// Keys suppressed while the busy indicator is shown.
pub const SUPPRESSED_KEYS: [&str; 2] = ["Enter", "Tab"];

/// Link message while a connection attempt is in flight.
pub const LINK_CONNECTING: &str = "Connecting to server...";

/// Link message once the channel is open.
pub const LINK_CONNECTED: &str = "connected";

/// Link message after the channel failed.
pub const LINK_LOST: &str = "connection lost, please retry";

/// Notice shown when the connectivity precheck fails.
pub const NOTICE_NETWORK_UNAVAILABLE: &str = "network unavailable, please try again later";

/// Notice shown when a request failed without a response.
pub const NOTICE_NETWORK_ERROR: &str = "network error";

/// Notice shown on a 400 response without a server message.
pub const NOTICE_BAD_REQUEST: &str = "request rejected";

/// Notice shown when credentials are cleared and the server gave no message.
pub const NOTICE_SESSION_EXPIRED: &str = "Login state is invalid, please sign in again";
