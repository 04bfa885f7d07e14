// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./rosalind.toml` > `~/.config/rosalind/rosalind.toml` >
//! `/etc/rosalind/rosalind.toml` with environment variable overrides via `ROSALIND_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::RosalindConfig;

/// Config sections reachable through `ROSALIND_<SECTION>_<KEY>` variables.
const ENV_SECTIONS: &[&str] = &[
    "server",
    "storage",
    "security",
    "governance",
    "client",
    "routing",
    "queue",
    "stream",
    "prometheus",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/rosalind/rosalind.toml` (system-wide)
/// 3. `~/.config/rosalind/rosalind.toml` (user XDG config)
/// 4. `./rosalind.toml` (local directory)
/// 5. `ROSALIND_*` environment variables
pub fn load_config() -> Result<RosalindConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<RosalindConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RosalindConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RosalindConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RosalindConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(RosalindConfig::default()))
        .merge(Toml::file("/etc/rosalind/rosalind.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("rosalind/rosalind.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("rosalind.toml"))
        .merge(env_provider())
}

/// Map `ROSALIND_*` variables onto config keys.
///
/// Uses `Env::map()` rather than `Env::split("_")`: keys contain underscores,
/// so `ROSALIND_CLIENT_BREAKER_THRESHOLD` must become `client.breaker_threshold`,
/// not `client.breaker.threshold`.
fn env_provider() -> Env {
    Env::prefixed("ROSALIND_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
