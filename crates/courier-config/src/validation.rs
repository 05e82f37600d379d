// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks run after deserialization.
//!
//! All problems are collected; validation never stops at the first one.

use crate::diagnostic::ConfigError;
use crate::model::CourierConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        fail(format!(
            "logging.level `{}` is not one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }

    let conn = &config.connection;
    if !has_scheme(&conn.url, &["ws://", "wss://"]) {
        fail(format!("connection.url `{}` must start with ws:// or wss://", conn.url));
    }
    if conn.handshake_timeout_ms == 0 {
        fail("connection.handshake_timeout_ms must be greater than 0".to_string());
    }
    if conn.max_reconnect_attempts < 1 {
        fail("connection.max_reconnect_attempts must be at least 1".to_string());
    }
    if conn.reconnect_base_delay_ms > conn.reconnect_max_delay_ms {
        fail(format!(
            "connection.reconnect_base_delay_ms ({}) exceeds reconnect_max_delay_ms ({})",
            conn.reconnect_base_delay_ms, conn.reconnect_max_delay_ms
        ));
    }
    if conn.outbound_buffer == 0 {
        fail("connection.outbound_buffer must be greater than 0".to_string());
    }

    if config.dedup.capacity < 2 {
        fail(format!(
            "dedup.capacity must be at least 2, got {}",
            config.dedup.capacity
        ));
    }

    if config.notifications.capacity == 0 {
        fail("notifications.capacity must be greater than 0".to_string());
    }
    if config.notifications.ttl_secs == 0 {
        fail("notifications.ttl_secs must be greater than 0".to_string());
    }

    if config.conversations.page_size == 0 {
        fail("conversations.page_size must be greater than 0".to_string());
    }
    if config.polling.enabled && config.polling.interval_secs == 0 {
        fail("polling.interval_secs must be greater than 0 when polling is enabled".to_string());
    }
    if config.polling.page_size == 0 {
        fail("polling.page_size must be greater than 0".to_string());
    }

    if !has_scheme(&config.backend.base_url, &["http://", "https://"]) {
        fail(format!(
            "backend.base_url `{}` must start with http:// or https://",
            config.backend.base_url
        ));
    }
    if config.backend.timeout_secs == 0 {
        fail("backend.timeout_secs must be greater than 0".to_string());
    }

    if config.cache.database_path.trim().is_empty() {
        fail("cache.database_path must not be empty".to_string());
    }
    if config.cache.write_buffer == 0 {
        fail("cache.write_buffer must be greater than 0".to_string());
    }

    let sw = &config.service_worker;
    if sw.version.trim().is_empty() {
        fail("service_worker.version must not be empty".to_string());
    }
    for (name, path) in [
        ("offline_page", &sw.offline_page),
        ("shell_path", &sw.shell_path),
        ("api_prefix", &sw.api_prefix),
    ] {
        if !path.starts_with('/') {
            fail(format!("service_worker.{name} `{path}` must be an absolute path"));
        }
    }

    if config.sound.sample_rate < 8_000 {
        fail(format!(
            "sound.sample_rate must be at least 8000, got {}",
            config.sound.sample_rate
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    schemes
        .iter()
        .any(|s| url.len() > s.len() && url.starts_with(s))
}
