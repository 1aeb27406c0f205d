// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./weft.toml` > `~/.config/weft/weft.toml` > `/etc/weft/weft.toml`
//! with environment variable overrides via `WEFT_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::WeftConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/weft/weft.toml` (system-wide)
/// 3. `~/.config/weft/weft.toml` (user XDG config)
/// 4. `./weft.toml` (local directory)
/// 5. `WEFT_*` environment variables
pub fn load_config() -> Result<WeftConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<WeftConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WeftConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<WeftConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WeftConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(WeftConfig::default()))
        .merge(Toml::file("/etc/weft/weft.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("weft/weft.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("weft.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `WEFT_RESYNC_WINDOW_MS` must map to `resync.window_ms`,
/// not `resync.window.ms`.
fn env_provider() -> Env {
    Env::prefixed("WEFT_").map(|key| {
        let mapped = map_env_key(key.as_str());
        mapped.into()
    })
}

/// Map a lowercased, prefix-stripped env var name onto its dotted config path.
fn map_env_key(key: &str) -> String {
    for section in ["server", "resync", "topup", "logging"] {
        if let Some(rest) = key.strip_prefix(section)
            && let Some(field) = rest.strip_prefix('_')
        {
            return format!("{section}.{field}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("resync_window_ms"), "resync.window_ms");
        assert_eq!(map_env_key("server_base_url"), "server.base_url");
        assert_eq!(map_env_key("topup_default_min_usd"), "topup.default_min_usd");
        assert_eq!(map_env_key("logging_level"), "logging.level");
    }

    #[test]
    fn unknown_env_sections_pass_through() {
        assert_eq!(map_env_key("something_else"), "something_else");
    }

    #[test]
    fn env_override_wins_over_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("weft.toml", "[resync]\nwindow_ms = 800\n")?;
            jail.set_env("WEFT_RESYNC_WINDOW_MS", "250");
            let config = load_config_from_path(Path::new("weft.toml"))?;
            assert_eq!(config.resync.window_ms, 250);
            Ok(())
        });
    }
}
