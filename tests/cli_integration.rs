//! CLI integration tests.
//!
//! These tests verify the CLI argument parsing and configuration loading.

use std::ffi::OsString;
use std::io::Write;
use std::time::Duration;

use tempfile::{NamedTempFile, TempDir};

use remo::cli::{parse_args_from, Args};
use remo::config::{Config, ConfigError};
use remo::security::{hash_secret, CredentialValidator};

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("remo")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

fn config_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&[])).unwrap();

    assert!(result.host.is_none());
    assert!(result.port.is_none());
    assert!(result.config.is_none());
    assert!(!result.trust_proxy);
    assert!(!result.help);
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-H",
        "0.0.0.0",
        "-p",
        "8080",
        "-l",
        "debug",
        "--trust-proxy",
        "-c",
        "/etc/remo.json",
    ]))
    .unwrap();

    assert_eq!(result.host.unwrap().to_string(), "0.0.0.0");
    assert_eq!(result.port, Some(8080));
    assert_eq!(result.log_level, Some("debug".to_string()));
    assert!(result.trust_proxy);
    assert_eq!(
        result.config.unwrap().to_str().unwrap(),
        "/etc/remo.json"
    );
}

#[test]
fn test_cli_invalid_port() {
    let result = parse_args_from(args(&["-p", "not-a-number"]));
    assert!(result.is_err());
}

#[test]
fn test_cli_invalid_host() {
    let result = parse_args_from(args(&["-H", "not-an-ip"]));
    assert!(result.is_err());
}

#[test]
fn test_hashed_password_round_trip() {
    let result = parse_args_from(args(&["--hash-password", "hunter2"])).unwrap();
    let hash = hash_secret(result.hash_password.as_deref().unwrap()).unwrap();

    assert!(hash.starts_with("$argon2"));
    let validator = CredentialValidator::new("admin", &hash);
    assert!(validator.is_hashed());
    assert!(validator.validate_credentials("admin", "hunter2"));
    assert!(!validator.validate_credentials("admin", "hunter3"));
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_config_load_from_file() {
    let file = config_file(
        r#"{
            "server": { "port": 9443 },
            "bot": { "user_id": 42 },
            "dashboard": { "username": "admin", "password": "hunter2" }
        }"#,
    );

    let cli_args = Args {
        config: Some(file.path().to_path_buf()),
        ..Args::default()
    };

    let config = Config::load(&cli_args).unwrap();
    assert_eq!(config.server.port, 9443);
    assert_eq!(config.bot.user_id, 42);
    assert!(config.validate().is_ok());
}

#[test]
fn test_cli_overrides_config_file() {
    let file = config_file(
        r#"{
            "server": { "host": "127.0.0.1", "port": 9443 },
            "dashboard": { "trust_proxy_headers": false },
            "logging": { "level": "warn" }
        }"#,
    );

    let cli_args = parse_args_from(args(&[
        "-c",
        file.path().to_str().unwrap(),
        "-H",
        "0.0.0.0",
        "-p",
        "7000",
        "--trust-proxy",
        "-l",
        "trace",
    ]))
    .unwrap();

    let config = Config::load(&cli_args).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 7000);
    assert!(config.dashboard.trust_proxy_headers);
    assert_eq!(config.log_filter(), "trace");
}

#[test]
fn test_config_missing_file() {
    let cli_args = Args {
        config: Some("/nonexistent/remo.json".into()),
        ..Args::default()
    };

    assert!(matches!(Config::load(&cli_args), Err(ConfigError::Io(_))));
}

#[test]
fn test_incomplete_config_is_rejected() {
    let file = config_file(r#"{ "dashboard": { "username": "admin", "password": "x" } }"#);
    let config = Config::from_file(file.path()).unwrap();

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("bot.user_id"));
}

#[test]
fn test_custom_limits_and_timeout() {
    let file = config_file(
        r#"{
            "bot": {
                "user_id": 1,
                "rate_limit": { "max_requests": 5, "window_secs": 10 },
                "confirmation_ttl_secs": 30
            },
            "dashboard": {
                "username": "admin",
                "password": "x",
                "session_timeout_secs": 900,
                "login_rate_limit": { "max_requests": 3, "window_secs": 60 }
            }
        }"#,
    );
    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.command_rate_limit().max_requests, 5);
    assert_eq!(config.command_rate_limit().window, Duration::from_secs(10));
    assert_eq!(config.login_rate_limit().max_requests, 3);
    assert_eq!(config.session_timeout(), Duration::from_secs(900));
    assert_eq!(config.confirmation_ttl(), Duration::from_secs(30));
}

#[test]
fn test_data_dir_paths() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.data_dir = dir.path().to_path_buf();

    assert_eq!(config.session_key_path(), dir.path().join(".session_key"));
    assert_eq!(
        config.webhook_secret_path(),
        dir.path().join(".webhook_secret")
    );
}
