// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as URL schemes, non-zero windows, and consistent top-up defaults.

use crate::diagnostic::ConfigError;
use crate::model::WeftConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &WeftConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let base_url = config.server.base_url.trim();
    match url::Url::parse(base_url) {
        Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
        Ok(parsed) => errors.push(ConfigError::Validation {
            message: format!(
                "server.base_url must use http or https, got scheme `{}`",
                parsed.scheme()
            ),
        }),
        Err(e) => errors.push(ConfigError::Validation {
            message: format!("server.base_url `{base_url}` is not a valid URL: {e}"),
        }),
    }

    if config.server.request_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "server.request_timeout_secs must be greater than 0".to_string(),
        });
    }

    if config.resync.window_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "resync.window_ms must be greater than 0".to_string(),
        });
    }

    if config.topup.default_min_usd < 0.0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "topup.default_min_usd must be non-negative, got {}",
                config.topup.default_min_usd
            ),
        });
    }

    if config.topup.default_suggested_usd < config.topup.default_min_usd {
        errors.push(ConfigError::Validation {
            message: format!(
                "topup.default_suggested_usd ({}) must be at least topup.default_min_usd ({})",
                config.topup.default_suggested_usd, config.topup.default_min_usd
            ),
        });
    }

    if !config.topup.explorer_tx_url.contains("{tx}") {
        errors.push(ConfigError::Validation {
            message: "topup.explorer_tx_url must contain the `{tx}` placeholder".to_string(),
        });
    }

    let level = config.logging.level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "logging.level `{}` is not one of {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
