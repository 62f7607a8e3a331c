//! Configuration management for smartlias.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::Duration;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::auth::LockoutPolicy;
use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "smartlias";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "smartlias.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `SMARTLIAS_`, sections split on `__`)
/// 2. TOML config file at `~/.config/smartlias/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Authentication and lockout configuration.
    pub auth: AuthConfig,
    /// Request rate limits.
    pub rate_limit: RateLimitConfig,
    /// SMS broadcast configuration.
    pub sms: SmsConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: String,
    /// Development mode relaxes rate limits.
    pub development: bool,
    /// Browser origins allowed by CORS. Empty disables CORS headers.
    pub cors_origins: Vec<String>,
}

/// Which storage backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// `SQLite` database file.
    #[default]
    Sqlite,
    /// Pretty-printed JSON files, one per collection (demo/mock data mode).
    Json,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selection.
    pub backend: StorageBackend,
    /// Path to the database file.
    /// Defaults to `~/.local/share/smartlias/smartlias.db`
    pub database_path: Option<PathBuf>,
    /// Directory holding the JSON data files.
    /// Defaults to `~/.local/share/smartlias/data`
    pub data_dir: Option<PathBuf>,
}

/// Authentication-related configuration.
///
/// The pepper is never serialized or printed.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Failed attempts before the account locks.
    pub max_attempts: u32,
    /// How long a lock lasts, in minutes.
    pub lockout_minutes: u32,
    /// Failures older than this many minutes no longer count.
    pub attempt_window_minutes: u32,
    /// Session lifetime in hours.
    pub session_ttl_hours: u32,
    /// Server-side secret mixed into every PIN hash.
    #[serde(skip_serializing)]
    pub pin_pepper: String,
}

/// Fixed-window request limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Whether limits are enforced at all.
    pub enabled: bool,
    /// Window for the general API limiter, in minutes.
    pub general_window_minutes: u32,
    /// Requests per window for the general API limiter.
    pub general_max: u32,
    /// Window for the login/username limiter, in minutes.
    pub auth_window_minutes: u32,
    /// Requests per window for login/username checks.
    pub auth_max: u32,
    /// Window for PIN changes, in minutes.
    pub pin_change_window_minutes: u32,
    /// PIN change requests per window.
    pub pin_change_max: u32,
}

/// SMS provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmsProvider {
    /// Write messages to the log instead of sending them.
    #[default]
    Log,
    /// POST messages to an HTTP SMS API.
    Http,
}

/// SMS-related configuration.
///
/// The API key is never serialized or printed.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    /// Send SMS when announcements are published.
    pub enabled: bool,
    /// Which gateway to use.
    pub provider: SmsProvider,
    /// Endpoint for the HTTP provider.
    pub api_url: Option<String>,
    /// API key for the HTTP provider.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Sender name shown on handsets.
    pub sender_name: String,
    /// Per-request timeout for the HTTP provider.
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:9000".to_string(),
            development: false,
            cors_origins: Vec::new(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_minutes: 15,
            attempt_window_minutes: 15,
            session_ttl_hours: 24,
            pin_pepper: String::new(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("max_attempts", &self.max_attempts)
            .field("lockout_minutes", &self.lockout_minutes)
            .field("attempt_window_minutes", &self.attempt_window_minutes)
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("pin_pepper", &"<redacted>")
            .finish()
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            general_window_minutes: 15,
            general_max: 200,
            auth_window_minutes: 120,
            auth_max: 50,
            pin_change_window_minutes: 120,
            pin_change_max: 50,
        }
    }
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: SmsProvider::Log,
            api_url: None,
            api_key: None,
            sender_name: "BARANGAY".to_string(),
            timeout_secs: 10,
        }
    }
}

impl fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmsConfig")
            .field("enabled", &self.enabled)
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("sender_name", &self.sender_name)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("SMARTLIAS_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(invalid(format!(
                "server.bind is not a socket address: {}",
                self.server.bind
            )));
        }

        if self.auth.max_attempts == 0 {
            return Err(invalid("auth.max_attempts must be greater than 0"));
        }
        if self.auth.lockout_minutes == 0 {
            return Err(invalid("auth.lockout_minutes must be greater than 0"));
        }
        if self.auth.attempt_window_minutes == 0 {
            return Err(invalid("auth.attempt_window_minutes must be greater than 0"));
        }
        if self.auth.session_ttl_hours == 0 {
            return Err(invalid("auth.session_ttl_hours must be greater than 0"));
        }

        let rl = &self.rate_limit;
        for (name, window, max) in [
            ("general", rl.general_window_minutes, rl.general_max),
            ("auth", rl.auth_window_minutes, rl.auth_max),
            ("pin_change", rl.pin_change_window_minutes, rl.pin_change_max),
        ] {
            if window == 0 || max == 0 {
                return Err(invalid(format!(
                    "rate_limit.{name} window and max must be greater than 0"
                )));
            }
        }

        if self.sms.provider == SmsProvider::Http
            && self.sms.api_url.as_deref().map_or(true, str::is_empty)
        {
            return Err(invalid("sms.api_url is required for the http provider"));
        }
        if self.sms.sender_name.trim().is_empty() {
            return Err(invalid("sms.sender_name must not be empty"));
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the JSON data directory, resolving defaults if not set.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join("data"))
    }

    /// Lockout thresholds derived from the auth section.
    #[must_use]
    pub fn lockout_policy(&self) -> LockoutPolicy {
        LockoutPolicy {
            max_attempts: self.auth.max_attempts,
            lockout_duration: Duration::minutes(i64::from(self.auth.lockout_minutes)),
            attempt_window: Duration::minutes(i64::from(self.auth.attempt_window_minutes)),
        }
    }

    /// Session lifetime.
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::hours(i64::from(self.auth.session_ttl_hours))
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.sms.provider, SmsProvider::Log);
    }

    #[test]
    fn test_default_auth_matches_lockout_constants() {
        let policy = Config::default().lockout_policy();
        assert_eq!(policy, LockoutPolicy::default());
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.lockout_duration, Duration::minutes(15));
        assert_eq!(policy.attempt_window, Duration::minutes(15));
    }

    #[test]
    fn test_default_rate_limits() {
        let rl = RateLimitConfig::default();
        assert_eq!(rl.general_max, 200);
        assert_eq!(rl.auth_window_minutes, 120);
        assert_eq!(rl.auth_max, 50);
        assert_eq!(rl.pin_change_max, 50);
    }

    #[test]
    fn test_validate_bad_bind() {
        let mut config = Config::default();
        config.server.bind = "not-an-address".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("server.bind"));
    }

    #[test]
    fn test_validate_zero_attempts() {
        let mut config = Config::default();
        config.auth.max_attempts = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("max_attempts"));
    }

    #[test]
    fn test_validate_zero_rate_limit() {
        let mut config = Config::default();
        config.rate_limit.pin_change_max = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("pin_change"));
    }

    #[test]
    fn test_validate_http_provider_requires_url() {
        let mut config = Config::default();
        config.sms.provider = SmsProvider::Http;
        assert!(config.validate().is_err());

        config.sms.api_url = Some("https://sms.example.ph/v1/send".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        assert!(config
            .database_path()
            .to_string_lossy()
            .contains("smartlias.db"));
    }

    #[test]
    fn test_data_dir_custom() {
        let mut config = Config::default();
        config.storage.data_dir = Some(PathBuf::from("/srv/smartlias/data"));
        assert_eq!(config.data_dir(), PathBuf::from("/srv/smartlias/data"));
    }

    #[test]
    fn test_session_ttl() {
        assert_eq!(Config::default().session_ttl(), Duration::hours(24));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[storage]
backend = "json"
data_dir = "/tmp/smartlias-data"

[auth]
max_attempts = 3

[sms]
enabled = false
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Json);
        assert_eq!(config.auth.max_attempts, 3);
        assert_eq!(config.auth.lockout_minutes, 15);
        assert!(!config.sms.enabled);
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[auth]\nsession_ttl_hours = 0\n").unwrap();

        let err = Config::load_from(Some(path)).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
    }

    #[test]
    fn test_secrets_never_serialized_or_printed() {
        let mut config = Config::default();
        config.auth.pin_pepper = "s3cret-pepper".to_string();
        config.sms.api_key = Some("sk-live-123".to_string());

        let json = serde_json::to_string_pretty(&config).unwrap();
        let debug = format!("{config:?}");
        for out in [&json, &debug] {
            assert!(!out.contains("s3cret-pepper"));
            assert!(!out.contains("sk-live-123"));
        }
        assert!(!json.contains("pin_pepper"));
        assert!(!json.contains("api_key"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("max_attempts: 5"));
    }

    #[test]
    fn test_secrets_still_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[auth]\npin_pepper = \"s3cret-pepper\"\n\n[sms]\napi_key = \"sk-live-123\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.auth.pin_pepper, "s3cret-pepper");
        assert_eq!(config.sms.api_key.as_deref(), Some("sk-live-123"));
    }

    #[test]
    fn test_backend_serializes_lowercase() {
        let json = serde_json::to_string(&StorageBackend::Json).unwrap();
        assert_eq!(json, "\"json\"");
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("smartlias"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }
}
