// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Weft session sync engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Weft configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WeftConfig {
    /// Session server endpoint settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Authoritative resync throttling and retry settings.
    #[serde(default)]
    pub resync: ResyncConfig,

    /// Top-up negotiation defaults.
    #[serde(default)]
    pub topup: TopupConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Session server endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Base URL of the session server (e.g. `http://localhost:9100`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout for REST calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries for transient HTTP failures (429, 500, 502, 503).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://localhost:9100".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    1
}

/// Resync throttle and retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResyncConfig {
    /// Throttle window: at most one refetch per window, fired on the leading edge.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Schedule one deferred refetch at the end of a window that suppressed requests.
    #[serde(default)]
    pub trailing_edge: bool,

    /// Delay before retrying a failed refetch.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Maximum consecutive retries of a failed refetch.
    #[serde(default = "default_resync_max_retries")]
    pub max_retries: u32,
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            trailing_edge: false,
            retry_delay_ms: default_retry_delay_ms(),
            max_retries: default_resync_max_retries(),
        }
    }
}

impl ResyncConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_window_ms() -> u64 {
    500
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_resync_max_retries() -> u32 {
    3
}

/// Defaults applied to top-up requests that omit optional amounts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TopupConfig {
    /// Minimum top-up in USD when the server does not say.
    #[serde(default = "default_min_usd")]
    pub default_min_usd: f64,

    /// Suggested top-up in USD when the server does not say.
    #[serde(default = "default_suggested_usd")]
    pub default_suggested_usd: f64,

    /// Transaction explorer link template; `{tx}` is replaced by the transaction id.
    #[serde(default = "default_explorer_tx_url")]
    pub explorer_tx_url: String,
}

impl Default for TopupConfig {
    fn default() -> Self {
        Self {
            default_min_usd: default_min_usd(),
            default_suggested_usd: default_suggested_usd(),
            explorer_tx_url: default_explorer_tx_url(),
        }
    }
}

impl TopupConfig {
    /// Builds the explorer link for a transaction id.
    pub fn explorer_link(&self, transaction_id: &str) -> String {
        self.explorer_tx_url.replace("{tx}", transaction_id)
    }
}

fn default_min_usd() -> f64 {
    5.0
}

fn default_suggested_usd() -> f64 {
    10.0
}

fn default_explorer_tx_url() -> String {
    "https://orbmarkets.io/tx/{tx}".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
