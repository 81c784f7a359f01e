//! Configuration management for remo.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::http::HeaderName;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::ServerConfig;
use crate::bot::{ConfirmationPolicy, UserId};
use crate::cli::Args;
use crate::security::RateLimitConfig;

/// Forwarding header trusted by default when behind a proxy.
pub const DEFAULT_PROXY_HEADER: &str = "x-forwarded-for";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener.
    pub server: ServerSection,
    /// Chat-bot access control.
    pub bot: BotSection,
    /// Web dashboard access control.
    pub dashboard: DashboardSection,
    /// Identity of the controlled machine.
    pub device: DeviceSection,
    /// Logging configuration.
    pub logging: LoggingSection,
    /// Directory for generated secrets.
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            bot: BotSection::default(),
            dashboard: DashboardSection::default(),
            device: DeviceSection::default(),
            logging: LoggingSection::default(),
            data_dir: PathBuf::from("."),
        }
    }
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8443,
        }
    }
}

/// Sliding-window limit as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    /// Enable rate limiting.
    pub enabled: bool,
    /// Admissions per window.
    pub max_requests: u32,
    /// Window size in seconds.
    pub window_secs: u64,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self::from(&RateLimitConfig::commands())
    }
}

impl From<&RateLimitConfig> for RateLimitSection {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_requests: config.max_requests,
            window_secs: config.window.as_secs(),
        }
    }
}

impl RateLimitSection {
    pub fn to_rate_limit(&self) -> RateLimitConfig {
        if !self.enabled {
            return RateLimitConfig::disabled();
        }
        RateLimitConfig::custom(self.max_requests, self.window_secs)
    }
}

/// Chat-bot section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSection {
    /// The single privileged chat user. Zero means unset.
    pub user_id: UserId,
    /// Secret path segment of the webhook URL. Generated and persisted when
    /// unset.
    pub webhook_secret: Option<String>,
    /// Per-user command limit.
    pub rate_limit: RateLimitSection,
    /// Command name to "needs an explicit affirm".
    pub confirm_commands: HashMap<String, bool>,
    /// How long a pending confirmation stays answerable.
    pub confirmation_ttl_secs: u64,
    /// Reject updates that lack the `X-Telegram-Bot-Api-Secret-Token` header.
    pub require_secret_header: bool,
}

impl Default for BotSection {
    fn default() -> Self {
        Self {
            user_id: 0,
            webhook_secret: None,
            rate_limit: RateLimitSection::default(),
            confirm_commands: default_confirm_commands(),
            confirmation_ttl_secs: 120,
            require_secret_header: false,
        }
    }
}

fn default_confirm_commands() -> HashMap<String, bool> {
    [
        ("shutdown", true),
        ("restart", true),
        ("sleep", true),
        ("lock", false),
        ("screenshot", false),
        ("volume", false),
        ("mute", false),
        ("unmute", false),
        ("brightness", false),
        ("status", false),
    ]
    .into_iter()
    .map(|(name, confirm)| (name.to_string(), confirm))
    .collect()
}

/// Dashboard section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSection {
    /// Administrator username.
    pub username: String,
    /// Administrator password, plaintext or an argon2 PHC string.
    pub password: String,
    /// Hex-encoded session signing key. Generated and persisted when unset.
    pub secret_key: Option<String>,
    /// Session lifetime in seconds.
    pub session_timeout_secs: u64,
    /// Per-IP login limit.
    pub login_rate_limit: RateLimitSection,
    /// Per-user limit on commands sent from the dashboard.
    pub command_rate_limit: RateLimitSection,
    /// Take the client IP from `proxy_header`.
    pub trust_proxy_headers: bool,
    /// Header the reverse proxy sets to the client address.
    pub proxy_header: String,
    /// Mark the session cookie `Secure`.
    pub secure_cookie: bool,
}

impl Default for DashboardSection {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            secret_key: None,
            session_timeout_secs: 86_400,
            login_rate_limit: RateLimitSection::from(&RateLimitConfig::login()),
            command_rate_limit: RateLimitSection::default(),
            trust_proxy_headers: false,
            proxy_header: DEFAULT_PROXY_HEADER.to_string(),
            secure_cookie: false,
        }
    }
}

/// Device section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSection {
    pub id: String,
    pub name: String,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            name: "My PC".to_string(),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level or filter directive.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    ///
    /// Unparsable numeric values are ignored.
    pub fn apply_env_from<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("REMO_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("REMO_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }

        if let Some(user_id) = var("REMO_USER_ID").and_then(|v| v.trim().parse().ok()) {
            self.bot.user_id = user_id;
        }
        if let Some(secret) = var("REMO_WEBHOOK_SECRET").filter(|v| !v.is_empty()) {
            self.bot.webhook_secret = Some(secret);
        }

        if let Some(username) = var("REMO_DASHBOARD_USERNAME") {
            self.dashboard.username = username;
        }
        if let Some(password) = var("REMO_DASHBOARD_PASSWORD") {
            self.dashboard.password = password;
        }
        if let Some(key) = var("REMO_DASHBOARD_SECRET_KEY").filter(|v| !v.is_empty()) {
            self.dashboard.secret_key = Some(key);
        }
        if let Some(timeout) = var("REMO_DASHBOARD_SESSION_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.dashboard.session_timeout_secs = timeout;
        }
        if let Some(trust) = var("REMO_TRUST_PROXY") {
            self.dashboard.trust_proxy_headers = matches!(trust.as_str(), "1" | "true" | "yes");
        }
        if let Some(header) = var("REMO_PROXY_HEADER").filter(|v| !v.is_empty()) {
            self.dashboard.proxy_header = header;
        }

        if let Some(id) = var("REMO_DEVICE_ID") {
            self.device.id = id;
        }
        if let Some(name) = var("REMO_DEVICE_NAME") {
            self.device.name = name;
        }
        if let Some(dir) = var("REMO_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Some(level) = var("REMO_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if args.trust_proxy {
            self.dashboard.trust_proxy_headers = true;
        }
        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env();
        config.apply_args(args);
        Ok(config)
    }

    /// Refuse to run without the privileged identities.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.user_id == 0 {
            return Err(ConfigError::Missing("bot.user_id"));
        }
        if self.dashboard.username.trim().is_empty() {
            return Err(ConfigError::Missing("dashboard.username"));
        }
        if self.dashboard.password.is_empty() {
            return Err(ConfigError::Missing("dashboard.password"));
        }
        if self.dashboard.session_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "dashboard.session_timeout_secs must be positive".to_string(),
            ));
        }
        for (name, section) in [
            ("bot.rate_limit", &self.bot.rate_limit),
            ("dashboard.login_rate_limit", &self.dashboard.login_rate_limit),
            ("dashboard.command_rate_limit", &self.dashboard.command_rate_limit),
        ] {
            if section.enabled && (section.max_requests == 0 || section.window_secs == 0) {
                return Err(ConfigError::Invalid(format!(
                    "{} needs a positive max_requests and window_secs",
                    name
                )));
            }
        }
        self.proxy_header()?;
        Ok(())
    }

    /// Convert to ServerConfig for the API server.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;
        Ok(ServerConfig::new(host.to_string(), self.server.port))
    }

    pub fn command_rate_limit(&self) -> RateLimitConfig {
        self.bot.rate_limit.to_rate_limit()
    }

    pub fn login_rate_limit(&self) -> RateLimitConfig {
        self.dashboard.login_rate_limit.to_rate_limit()
    }

    pub fn dashboard_command_rate_limit(&self) -> RateLimitConfig {
        self.dashboard.command_rate_limit.to_rate_limit()
    }

    /// The configured forwarding header as a header name.
    pub fn proxy_header(&self) -> Result<HeaderName, ConfigError> {
        HeaderName::try_from(self.dashboard.proxy_header.trim().to_ascii_lowercase()).map_err(|_| {
            ConfigError::Invalid(format!(
                "dashboard.proxy_header is not a header name: {}",
                self.dashboard.proxy_header
            ))
        })
    }

    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy::new(self.bot.confirm_commands.clone())
    }

    pub fn confirmation_ttl(&self) -> Duration {
        Duration::from_secs(self.bot.confirmation_ttl_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.dashboard.session_timeout_secs)
    }

    /// Where the generated session key is persisted.
    pub fn session_key_path(&self) -> PathBuf {
        self.data_dir.join(".session_key")
    }

    /// Where the generated webhook secret is persisted.
    pub fn webhook_secret_path(&self) -> PathBuf {
        self.data_dir.join(".webhook_secret")
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// JSON parsing error.
    #[error("failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),
    /// Invalid host address.
    #[error("invalid host address: {0}")]
    InvalidHost(String),
    /// A required value is not set anywhere.
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    /// A value is set but unusable.
    #[error("invalid setting: {0}")]
    Invalid(String),
}
