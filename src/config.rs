//! Controller configuration parameters
//!
//! All tunable timings for the offline-fallback controller plus the
//! command-channel trust settings. Values are loaded from
//! `<data_dir>/config.json` when present; otherwise defaults apply.

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Core controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    // --- Countdown ---
    /// Grace period between stable connectivity loss and offline mode (ms)
    pub countdown_duration_ms: u64,
    /// Interval of the read-only countdown status tick (ms)
    pub status_interval_ms: u64,

    // --- Connectivity ---
    /// Quiet window a raw connectivity report must survive (ms)
    pub debounce_window_ms: u64,
    /// `host:port` used by the TCP reachability probe
    pub probe_host: String,
    /// Probe connect timeout (ms)
    pub probe_timeout_ms: u64,
    /// How often the host binary probes on its own (ms)
    pub probe_interval_ms: u64,

    // --- Sync ---
    /// A successful sync suppresses new attempts for this long (ms)
    pub sync_debounce_ms: u64,

    // --- Command channel ---
    /// Only SMS commands from this number are accepted
    pub authorized_sender: Option<String>,
    /// Shared key for HMAC-signed envelopes; unsigned envelopes are
    /// rejected when set
    pub command_psk: Option<String>,

    // --- Storage ---
    /// Directory for the durable store, pending-command slot and spool
    pub data_dir: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            // Countdown
            countdown_duration_ms: 5 * 60 * 1000,
            status_interval_ms: 10 * 1000,

            // Connectivity
            debounce_window_ms: 500,
            probe_host: "1.1.1.1:53".into(),
            probe_timeout_ms: 2_000,
            probe_interval_ms: 5_000,

            // Sync
            sync_debounce_ms: 30 * 1000,

            // Command channel
            authorized_sender: None,
            command_psk: None,

            data_dir: "./offline-fallback-data".into(),
        }
    }
}

/// Range-check every field. Invalid values are rejected, never clamped.
pub fn validate(cfg: &FallbackConfig) -> Result<(), ConfigError> {
    if !(1_000..=24 * 60 * 60 * 1000).contains(&cfg.countdown_duration_ms) {
        return Err(ConfigError::ValidationFailed(
            "countdown_duration_ms must be 1 s–24 h",
        ));
    }
    if !(100..=cfg.countdown_duration_ms).contains(&cfg.status_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "status_interval_ms must be 100 ms–countdown_duration_ms",
        ));
    }
    if !(50..=10_000).contains(&cfg.debounce_window_ms) {
        return Err(ConfigError::ValidationFailed(
            "debounce_window_ms must be 50–10000",
        ));
    }
    if cfg.debounce_window_ms >= cfg.countdown_duration_ms {
        return Err(ConfigError::ValidationFailed(
            "debounce_window_ms must be < countdown_duration_ms",
        ));
    }
    if !(100..=30_000).contains(&cfg.probe_timeout_ms) {
        return Err(ConfigError::ValidationFailed(
            "probe_timeout_ms must be 100–30000",
        ));
    }
    if cfg.probe_interval_ms < cfg.probe_timeout_ms {
        return Err(ConfigError::ValidationFailed(
            "probe_interval_ms must be >= probe_timeout_ms",
        ));
    }
    if !cfg.probe_host.contains(':') {
        return Err(ConfigError::ValidationFailed(
            "probe_host must be host:port",
        ));
    }
    if cfg.sync_debounce_ms > 60 * 60 * 1000 {
        return Err(ConfigError::ValidationFailed(
            "sync_debounce_ms must be <= 1 h",
        ));
    }
    if let Some(sender) = &cfg.authorized_sender {
        let digits = sender.bytes().filter(u8::is_ascii_digit).count();
        if digits < 6 {
            return Err(ConfigError::ValidationFailed(
                "authorized_sender must contain at least 6 digits",
            ));
        }
    }
    if cfg.command_psk.as_ref().is_some_and(|k| k.len() < 8) {
        return Err(ConfigError::ValidationFailed(
            "command_psk must be at least 8 bytes",
        ));
    }
    if cfg.data_dir.is_empty() {
        return Err(ConfigError::ValidationFailed("data_dir must not be empty"));
    }
    Ok(())
}

/// Load and validate a JSON config file. A missing file yields defaults.
pub fn load(path: &Path) -> Result<FallbackConfig, ConfigError> {
    let cfg = match std::fs::read_to_string(path) {
        Ok(text) => {
            let cfg: FallbackConfig =
                serde_json::from_str(&text).map_err(|_| ConfigError::Corrupted)?;
            info!("config: loaded {}", path.display());
            cfg
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("config: {} not found, using defaults", path.display());
            FallbackConfig::default()
        }
        Err(_) => return Err(ConfigError::Io),
    };
    validate(&cfg)?;
    Ok(cfg)
}
