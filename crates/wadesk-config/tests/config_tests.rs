// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the wadesk configuration system.

use figment::Jail;
use wadesk_config::diagnostic::ConfigError;
use wadesk_config::model::WadeskConfig;
use wadesk_config::{load_and_validate_str, load_config, load_config_from_str};

/// Valid TOML touching every section deserializes successfully.
#[test]
fn valid_toml_deserializes_into_wadesk_config() {
    let toml = r#"
[logging]
level = "debug"

[server]
host = "0.0.0.0"
port = 9000
bearer_token = "s3cret"

[hub]
max_connections = 3
heartbeat_interval_secs = 5
stale_after_secs = 20

[provider]
base_url = "http://localhost:4010/v1"
account_sid = "AC123"
auth_token = "tok"

[cache]
fresh_secs = 10
max_stale_secs = 30

[client]
events_url = "http://localhost:9000/events"
growth_factor = 1.5
max_attempts = 3

[recovery]
replay_delay_ms = 0
capacity = 10

[poll]
interval_secs = 5
always_on = true

[storage]
database_path = "/tmp/wadesk-test.db"
wal_mode = false
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.bearer_token.as_deref(), Some("s3cret"));
    assert_eq!(config.hub.max_connections, 3);
    assert_eq!(config.hub.stale_after_secs, 20);
    assert_eq!(config.hub.outbound_buffer, 64);
    assert_eq!(config.provider.account_sid.as_deref(), Some("AC123"));
    assert_eq!(config.cache.fresh_secs, 10);
    assert_eq!(config.client.growth_factor, 1.5);
    assert_eq!(config.client.max_attempts, 3);
    assert_eq!(config.recovery.replay_delay_ms, 0);
    assert!(config.poll.always_on);
    assert_eq!(config.storage.database_path, "/tmp/wadesk-test.db");
    assert!(!config.storage.wal_mode);
}

/// Missing optional sections use defaults without error.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.logging.level, "info");
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8787);
    assert!(config.server.bearer_token.is_none());
    assert_eq!(config.hub.max_connections, 500);
    assert_eq!(config.hub.heartbeat_interval_secs, 15);
    assert_eq!(config.hub.stale_after_secs, 300);
    assert_eq!(config.cache.fresh_secs, 60);
    assert_eq!(config.cache.max_stale_secs, 300);
    assert_eq!(config.client.base_delay_ms, 1000);
    assert_eq!(config.client.max_delay_ms, 30_000);
    assert_eq!(config.client.health_check_interval_secs, 5);
    assert_eq!(config.recovery.replay_delay_ms, 100);
    assert_eq!(config.poll.interval_secs, 30);
    assert!(!config.poll.always_on);
    assert!(config.storage.database_path.ends_with("wadesk.db"));
    assert!(config.storage.wal_mode);
}

/// Typo in a section is rejected and reported with a suggestion.
#[test]
fn unknown_key_suggests_correction() {
    let toml = r#"
[hub]
max_conections = 5
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown field");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "max_conections"
                && suggestion.as_deref() == Some("max_connections")
                && valid_keys.contains("heartbeat_interval_secs")
        })
    });
    assert!(found, "expected UnknownKey for max_conections, got: {errors:?}");
}

/// Unexpected top-level section is rejected by deny_unknown_fields.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[telemetry]
enabled = true
"#;

    let err = load_config_from_str(toml).expect_err("unknown top-level section should be rejected");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("telemetry"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// Invalid type (string where number expected) produces an InvalidType diagnostic.
#[test]
fn invalid_type_is_reported_with_key_path() {
    let toml = r#"
[server]
port = "eighty"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject invalid type");
    assert!(
        errors.iter().any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("port"))),
        "got: {errors:?}"
    );
}

/// Semantic validation runs after a successful parse.
#[test]
fn validation_rejects_inverted_cache_window() {
    let toml = r#"
[cache]
fresh_secs = 600
max_stale_secs = 300
"#;

    let errors = load_and_validate_str(toml).expect_err("inverted window should fail");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { message } if message.contains("fresh_secs"))
    ));
}

/// ConfigError renders through miette with code and help.
#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "max_conections".to_string(),
        suggestion: Some("max_connections".to_string()),
        valid_keys: "max_connections, heartbeat_interval_secs".to_string(),
        span: None,
        src: None,
    };

    assert_eq!(
        error.code().map(|c| c.to_string()).as_deref(),
        Some("wadesk::config::unknown_key")
    );
    let help = error.help().expect("help text").to_string();
    assert!(help.contains("did you mean `max_connections`"), "got: {help}");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("max_conections"));
}

/// Defaults survive a serialize/deserialize pass through JSON.
#[test]
fn serialized_defaults_are_sensible() {
    let json = serde_json::to_value(WadeskConfig::default()).expect("serialize");
    assert_eq!(json["hub"]["max_connections"], 500);
    assert_eq!(json["client"]["growth_factor"], 2.0);
    assert!(json["server"]["bearer_token"].is_null());
}

/// `WADESK_<SECTION>_<KEY>` env vars override file values, keeping underscores in keys.
#[test]
fn env_vars_override_file_values() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "wadesk.toml",
            r#"
[hub]
max_connections = 10

[client]
silence_timeout_secs = 90
"#,
        )?;
        jail.set_env("WADESK_HUB_MAX_CONNECTIONS", "2");
        jail.set_env("WADESK_PROVIDER_AUTH_TOKEN", "from-env");

        let config = load_config()?;
        assert_eq!(config.hub.max_connections, 2);
        assert_eq!(config.client.silence_timeout_secs, 90);
        assert_eq!(config.provider.auth_token.as_deref(), Some("from-env"));
        Ok(())
    });
}

/// Without any file present the hierarchy falls back to defaults.
#[test]
fn missing_config_files_silently_skipped() {
    Jail::expect_with(|_jail| {
        let config = load_config()?;
        assert_eq!(config.server.port, 8787);
        Ok(())
    });
}

/// Typos in a local file surface through the full loader.
#[test]
fn local_file_typo_is_reported() {
    Jail::expect_with(|jail| {
        jail.create_file("wadesk.toml", "[poll]\nintervl_secs = 3\n")?;
        let errors = wadesk_config::load_and_validate().expect_err("typo should fail");
        let found = errors.iter().any(|e| {
            matches!(e, ConfigError::UnknownKey { key, suggestion, .. }
                if key == "intervl_secs" && suggestion.as_deref() == Some("interval_secs"))
        });
        assert!(found, "got: {errors:?}");
        Ok(())
    });
}
