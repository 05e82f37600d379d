// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model for the Courier sync core.
//!
//! Every section rejects unknown keys so typos fail at startup.

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Persistent channel settings.
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub dedup: DedupConfig,

    /// Notification feed sizing and filtering.
    #[serde(default)]
    pub notifications: NotificationsConfig,

    #[serde(default)]
    pub conversations: ConversationsConfig,

    /// History polling used while the channel is down.
    #[serde(default)]
    pub polling: PollingConfig,

    /// REST backend.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Durable offline cache.
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub service_worker: ServiceWorkerConfig,

    #[serde(default)]
    pub sound: SoundConfig,

    #[serde(default)]
    pub location: LocationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error.
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

/// Channel connection, handshake and reconnect policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// WebSocket endpoint of the event channel.
    #[serde(default = "default_connection_url")]
    pub url: String,

    /// Upper bound for transport open plus authentication.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,

    /// Failed attempts tolerated before the channel is declared unreachable.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,

    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,

    /// Capacity of the outbound emit buffer.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_connection_url(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

fn default_connection_url() -> String {
    "ws://127.0.0.1:3000/ws".to_string()
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_base_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

fn default_outbound_buffer() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DedupConfig {
    /// Fingerprints remembered before the older half is evicted.
    #[serde(default = "default_dedup_capacity")]
    pub capacity: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            capacity: default_dedup_capacity(),
        }
    }
}

fn default_dedup_capacity() -> usize {
    100
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationsConfig {
    /// Items kept in the feed; the oldest is evicted past this.
    #[serde(default = "default_feed_capacity")]
    pub capacity: usize,

    #[serde(default = "default_feed_ttl_secs")]
    pub ttl_secs: u64,

    /// Drop sound and banner for routine items. High and emergency are never muted.
    #[serde(default)]
    pub quiet_routine: bool,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            capacity: default_feed_capacity(),
            ttl_secs: default_feed_ttl_secs(),
            quiet_routine: false,
        }
    }
}

fn default_feed_capacity() -> usize {
    10
}

fn default_feed_ttl_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationsConfig {
    /// Window over which snapshot writes are coalesced.
    #[serde(default = "default_persist_debounce_ms")]
    pub persist_debounce_ms: u64,

    #[serde(default = "default_conversation_page_size")]
    pub page_size: u32,
}

impl Default for ConversationsConfig {
    fn default() -> Self {
        Self {
            persist_debounce_ms: default_persist_debounce_ms(),
            page_size: default_conversation_page_size(),
        }
    }
}

fn default_persist_debounce_ms() -> u64 {
    1_000
}

fn default_conversation_page_size() -> u32 {
    50
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PollingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_poll_page_size")]
    pub page_size: u32,

    /// Keep polling while the channel is authenticated too.
    #[serde(default)]
    pub always: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_poll_interval_secs(),
            page_size: default_poll_page_size(),
            always: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_poll_page_size() -> u32 {
    20
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the REST API, without a trailing slash.
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    #[serde(default = "default_backend_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts for transient failures (429 and 5xx).
    #[serde(default = "default_backend_max_retries")]
    pub max_retries: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            timeout_secs: default_backend_timeout_secs(),
            max_retries: default_backend_max_retries(),
        }
    }
}

fn default_backend_url() -> String {
    "http://127.0.0.1:3000/api".to_string()
}

fn default_backend_timeout_secs() -> u64 {
    30
}

fn default_backend_max_retries() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// SQLite file backing the offline cache.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Pending write-behind operations before new writes are dropped.
    #[serde(default = "default_write_buffer")]
    pub write_buffer: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            write_buffer: default_write_buffer(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|d| d.join("courier").join("offline.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("courier-offline.db"))
        .display()
        .to_string()
}

fn default_write_buffer() -> usize {
    256
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceWorkerConfig {
    /// Cache version tag; caches of other versions are purged on activate.
    #[serde(default = "default_sw_version")]
    pub version: String,

    /// Paths precached on install.
    #[serde(default = "default_static_assets")]
    pub static_assets: Vec<String>,

    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    #[serde(default = "default_shell_path")]
    pub shell_path: String,

    /// Requests under this path are treated as API calls.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
}

impl Default for ServiceWorkerConfig {
    fn default() -> Self {
        Self {
            version: default_sw_version(),
            static_assets: default_static_assets(),
            offline_page: default_offline_page(),
            shell_path: default_shell_path(),
            api_prefix: default_api_prefix(),
        }
    }
}

fn default_sw_version() -> String {
    "v1".to_string()
}

fn default_static_assets() -> Vec<String> {
    ["/", "/offline.html", "/manifest.json", "/favicon.ico"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_offline_page() -> String {
    "/offline.html".to_string()
}

fn default_shell_path() -> String {
    "/".to_string()
}

fn default_api_prefix() -> String {
    "/api/".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SoundConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: default_sample_rate(),
        }
    }
}

fn default_sample_rate() -> u32 {
    44_100
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LocationConfig {
    /// Budget for the geolocation lookup attached to emergency sends.
    #[serde(default = "default_location_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_location_timeout_ms(),
        }
    }
}

fn default_location_timeout_ms() -> u64 {
    3_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CourierConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.connection.handshake_timeout_ms, 10_000);
        assert_eq!(config.connection.max_reconnect_attempts, 5);
        assert_eq!(config.dedup.capacity, 100);
        assert_eq!(config.notifications.capacity, 10);
        assert_eq!(config.notifications.ttl_secs, 10);
        assert!(!config.notifications.quiet_routine);
        assert_eq!(config.conversations.persist_debounce_ms, 1_000);
        assert!(config.polling.enabled);
        assert_eq!(config.service_worker.offline_page, "/offline.html");
        assert_eq!(config.location.timeout_ms, 3_000);
    }

    #[test]
    fn database_path_ends_in_offline_db() {
        let config = CourierConfig::default();
        assert!(config.cache.database_path.ends_with("offline.db"));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = CourierConfig::default();
        let text = toml::to_string(&config).unwrap();
        let back: CourierConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.connection.url, config.connection.url);
        assert_eq!(back.service_worker.static_assets, config.service_worker.static_assets);
    }
}
