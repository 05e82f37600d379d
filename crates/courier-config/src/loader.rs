// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered config loading with figment.
//!
//! Later layers win: compiled defaults, `/etc/courier/courier.toml`,
//! `~/.config/courier/courier.toml`, `./courier.toml`, then `COURIER_*`
//! environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::CourierConfig;

/// Sections addressable through environment variables.
///
/// Longer names come first so `service_worker_` is not read as `service.`.
const ENV_SECTIONS: &[&str] = &[
    "service_worker",
    "notifications",
    "conversations",
    "connection",
    "location",
    "logging",
    "polling",
    "backend",
    "dedup",
    "cache",
    "sound",
];

pub const SYSTEM_CONFIG_PATH: &str = "/etc/courier/courier.toml";
pub const LOCAL_CONFIG_FILE: &str = "courier.toml";

/// Path of the per-user config file, if a config dir is known.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("courier").join(LOCAL_CONFIG_FILE))
}

/// Loads the full hierarchy with env overrides.
pub fn load_config() -> Result<CourierConfig, figment::Error> {
    build_figment().extract()
}

/// Defaults plus one inline TOML document. No files, no env.
pub fn load_config_from_str(toml_content: &str) -> Result<CourierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Defaults, one explicit file, then env overrides.
pub fn load_config_from_path(path: &Path) -> Result<CourierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The unextracted figment behind [`load_config`].
pub fn build_figment() -> Figment {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH));
    if let Some(user) = user_config_path() {
        figment = figment.merge(Toml::file(user));
    }
    figment.merge(Toml::file(LOCAL_CONFIG_FILE)).merge(env_provider())
}

/// Maps `COURIER_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Splitting on `_` would break keys like `ttl_secs`, so only the known
/// section prefix is converted.
fn env_provider() -> Env {
    Env::prefixed("COURIER_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    ENV_SECTIONS
        .iter()
        .find_map(|section| {
            key.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|rest| format!("{section}.{rest}"))
        })
        .unwrap_or(key)
}
