//! Client context errors.

use parley_channel::ChannelError;
use parley_core::CredentialError;
use parley_request::RequestError;
use parley_settings::SettingsError;
use thiserror::Error;

/// Errors from building or using a [`crate::ClientContext`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Settings failed validation.
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),

    /// The HTTP client could not be built.
    #[error("request layer: {0}")]
    Request(#[from] RequestError),

    /// A channel could not be opened.
    #[error("channel: {0}")]
    Channel(#[from] ChannelError),

    /// Credentials could not be stored or cleared.
    #[error("credentials: {0}")]
    Credentials(#[from] CredentialError),

    /// The context has been shut down.
    #[error("client is shutting down")]
    ShuttingDown,
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ClientError>;
