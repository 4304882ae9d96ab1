//! # parley-client
//!
//! Wires the channel and request layers into one [`ClientContext`] built
//! from [`parley_settings::ClientSettings`]. The two layers never call each
//! other; they share only the auth-expiry action and the context's ports.

#![deny(unsafe_code)]

pub mod context;
pub mod errors;

pub use context::{ChannelCallbacks, ClientContext, ClientContextBuilder};
pub use errors::{ClientError, Result};
