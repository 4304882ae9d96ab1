//! # parley-settings
//!
//! Client configuration with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`ClientSettings::default()`]
//! 2. **User file**: `~/.parley/settings.json`
//! 3. **Environment variables**: `PARLEY_*` overrides (e.g.
//!    `PARLEY_WS_BASE_URL`, `PARLEY_HEARTBEAT_INTERVAL_MS`)
//!
//! Settings are read once at startup and are immutable afterwards.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

/// Process-wide settings.
static SETTINGS: OnceLock<ClientSettings> = OnceLock::new();

/// Get the process-wide settings.
///
/// On first call, loads from `~/.parley/settings.json` with env overrides.
/// Falls back to compiled defaults if loading fails.
pub fn get_settings() -> &'static ClientSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            ClientSettings::default()
        })
    })
}

/// Initialize the process-wide settings with a specific value.
///
/// # Errors
///
/// Returns the provided settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: ClientSettings) -> std::result::Result<(), ClientSettings> {
    SETTINGS.set(settings)
}
