//! Settings loading.
//!
//! Loading flow:
//! 1. Start with compiled [`ClientSettings::default()`]
//! 2. If `~/.parley/settings.json` exists, merge its values over the defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate the result

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Format, Json, Serialized};
use tracing::debug;

use crate::errors::Result;
use crate::types::ClientSettings;

/// Directory holding the client's files (`~/.parley`).
pub fn parley_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".parley")
}

/// Resolve the path to the settings file (`~/.parley/settings.json`).
pub fn settings_path() -> PathBuf {
    parley_dir().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ClientSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields the defaults. An unreadable or mistyped file is an
/// error.
pub fn load_settings_from_path(path: &Path) -> Result<ClientSettings> {
    let mut figment = Figment::from(Serialized::defaults(ClientSettings::default()));
    if path.exists() {
        debug!(?path, "loading settings from file");
        figment = figment.merge(Json::file(path));
    } else {
        debug!(?path, "settings file not found, using defaults");
    }

    let mut settings: ClientSettings = figment.extract()?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Apply `PARLEY_*` environment variable overrides.
///
/// Invalid values are ignored with a warning and the file/default value kept.
pub fn apply_env_overrides(settings: &mut ClientSettings) {
    // ── Endpoints ───────────────────────────────────────────────────
    if let Some(v) = read_env_string("PARLEY_HTTP_BASE_URL") {
        settings.endpoints.http_base_url = v;
    }
    if let Some(v) = read_env_string("PARLEY_WS_BASE_URL") {
        settings.endpoints.ws_base_url = v;
    }

    // ── Channel ─────────────────────────────────────────────────────
    if let Some(v) = read_env_u64("PARLEY_HEARTBEAT_INTERVAL_MS", 1_000, 600_000) {
        settings.channel.heartbeat_interval_ms = v;
    }
    if let Some(v) = read_env_u64("PARLEY_LIVENESS_DEADLINE_MS", 100, 600_000) {
        settings.channel.liveness_deadline_ms = v;
    }

    // ── Requests ────────────────────────────────────────────────────
    if let Some(v) = read_env_u64("PARLEY_REQUEST_TIMEOUT_MS", 100, 3_600_000) {
        settings.request.timeout_ms = v;
    }
    if let Some(v) = read_env_u64("PARLEY_BUSY_GRACE_MS", 0, 10_000) {
        settings.request.busy_grace_ms = v;
    }
    if let Some(v) = read_env_bool("PARLEY_ABORT_ON_ERROR") {
        settings.request.abort_on_error = v;
    }

    // ── Logging / storage ───────────────────────────────────────────
    if let Some(v) = read_env_string("PARLEY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("PARLEY_LOG_JSON") {
        settings.logging.json = v;
    }
    if let Some(v) = read_env_string("PARLEY_CREDENTIALS_PATH") {
        settings.credentials_path = Some(v);
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid integer env var, ignoring");
    }
    result
}
