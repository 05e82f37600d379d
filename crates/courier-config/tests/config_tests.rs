// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for Courier configuration loading.

use courier_config::diagnostic::{ConfigError, suggest_key};
use courier_config::{load_and_validate_str, load_config_from_path, load_config_from_str};

#[test]
fn full_document_deserializes() {
    let toml = r#"
[logging]
level = "debug"

[connection]
url = "wss://rt.example.test/ws"
handshake_timeout_ms = 5000
max_reconnect_attempts = 3

[dedup]
capacity = 50

[notifications]
capacity = 5
ttl_secs = 4
quiet_routine = true

[polling]
enabled = false

[backend]
base_url = "https://api.example.test"
max_retries = 2

[service_worker]
version = "v7"
static_assets = ["/", "/app.js"]

[sound]
enabled = false
"#;

    let config = load_config_from_str(toml).expect("valid document");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.connection.url, "wss://rt.example.test/ws");
    assert_eq!(config.connection.handshake_timeout_ms, 5000);
    assert_eq!(config.connection.max_reconnect_attempts, 3);
    // untouched keys keep defaults
    assert_eq!(config.connection.reconnect_max_delay_ms, 30_000);
    assert_eq!(config.dedup.capacity, 50);
    assert_eq!(config.notifications.capacity, 5);
    assert!(config.notifications.quiet_routine);
    assert!(!config.polling.enabled);
    assert_eq!(config.backend.max_retries, 2);
    assert_eq!(config.service_worker.version, "v7");
    assert_eq!(config.service_worker.static_assets, vec!["/", "/app.js"]);
    assert!(!config.sound.enabled);
}

#[test]
fn empty_document_yields_defaults() {
    let config = load_and_validate_str("").expect("defaults validate");
    assert_eq!(config.dedup.capacity, 100);
    assert_eq!(config.notifications.ttl_secs, 10);
}

#[test]
fn unknown_key_gets_a_suggestion() {
    let toml = "[notifications]\nttl_sec = 3\n";
    let errors = load_and_validate_str(toml).expect_err("typo must be rejected");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "ttl_sec");
            assert_eq!(suggestion.as_deref(), Some("ttl_secs"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let err = load_config_from_str("[telemetry]\nenabled = true\n").unwrap_err();
    assert!(err.to_string().contains("telemetry"));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[dedup]\ncapacity = \"lots\"\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::InvalidType { .. }));
}

#[test]
fn semantic_errors_surface_through_load() {
    let errors = load_and_validate_str("[dedup]\ncapacity = 1\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
}

#[test]
fn suggestions_cover_connection_keys() {
    let keys = &[
        "url",
        "handshake_timeout_ms",
        "max_reconnect_attempts",
        "reconnect_base_delay_ms",
        "reconnect_max_delay_ms",
        "outbound_buffer",
    ];
    assert_eq!(
        suggest_key("outbound_bufer", keys).as_deref(),
        Some("outbound_buffer")
    );
}

#[test]
#[serial_test::serial]
fn explicit_path_with_env_override() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("custom.toml", "[cache]\nwrite_buffer = 8\n")?;
        jail.set_env("COURIER_CACHE_WRITE_BUFFER", "16");
        jail.set_env("COURIER_SERVICE_WORKER_VERSION", "v9");
        let config = load_config_from_path(std::path::Path::new("custom.toml"))?;
        assert_eq!(config.cache.write_buffer, 16);
        assert_eq!(config.service_worker.version, "v9");
        Ok(())
    });
}
