//! Configuration for the MedFlow data access layer
//!
//! The backend project URL and anon key are deployment configuration, not
//! secrets (the anon key is the public client key). They load from a TOML
//! file with environment-variable overrides for containerized setups.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::logger::{self, LogTag};

/// Environment override for the backend project URL
pub const ENV_SUPABASE_URL: &str = "MEDFLOW_SUPABASE_URL";
/// Environment override for the public anon key
pub const ENV_SUPABASE_ANON_KEY: &str = "MEDFLOW_SUPABASE_ANON_KEY";

/// Synthetic email domain for identifier-based sign-in.
/// Identifiers without an '@' are rewritten to `<id>@medihack.local`.
pub const DEFAULT_AUTH_EMAIL_DOMAIN: &str = "medihack.local";

const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub supabase: SupabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    /// Project URL, e.g. https://<ref>.supabase.co
    pub url: String,
    /// Public anon key sent with every request
    pub anon_key: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_auth_email_domain")]
    pub auth_email_domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_auth_email_domain() -> String {
    DEFAULT_AUTH_EMAIL_DOMAIN.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            auth_email_domain: DEFAULT_AUTH_EMAIL_DOMAIN.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            supabase: SupabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply env overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Config = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from file when present, otherwise fall back to defaults plus
    /// env overrides. Parse failures are logged, not fatal.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match Self::load(path) {
                Ok(config) => return config,
                Err(e) => {
                    logger::warning(
                        LogTag::Config,
                        &format!("Config load failed, using defaults: {:#}", e),
                    );
                }
            }
        }
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_SUPABASE_URL) {
            if !url.trim().is_empty() {
                self.supabase.url = url;
            }
        }
        if let Ok(key) = std::env::var(ENV_SUPABASE_ANON_KEY) {
            if !key.trim().is_empty() {
                self.supabase.anon_key = key;
            }
        }
    }

    /// Verify the config carries everything needed to reach the backend
    pub fn validate(&self) -> Result<()> {
        if self.supabase.url.trim().is_empty() {
            anyhow::bail!("supabase.url is empty");
        }
        if self.supabase.anon_key.trim().is_empty() {
            anyhow::bail!("supabase.anon_key is empty");
        }
        if self.supabase.timeout_seconds == 0 {
            anyhow::bail!("supabase.timeout_seconds must be greater than zero");
        }
        Ok(())
    }

    /// Minimum log level from the `logging.level` string
    pub fn log_level(&self) -> crate::logger::LogLevel {
        crate::logger::LogLevel::parse(&self.logging.level)
            .unwrap_or(crate::logger::LogLevel::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.supabase.timeout_seconds, DEFAULT_TIMEOUT_SECONDS);
        assert_eq!(config.supabase.auth_email_domain, "medihack.local");
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_err()); // url/key empty by default
    }

    #[test]
    fn test_parse_minimal_toml() {
        let raw = r#"
            [supabase]
            url = "https://example.supabase.co"
            anon_key = "public-anon-key"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.supabase.url, "https://example.supabase.co");
        assert_eq!(config.supabase.timeout_seconds, DEFAULT_TIMEOUT_SECONDS);
        assert_eq!(config.supabase.auth_email_domain, "medihack.local");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[supabase]"));
        assert!(toml_str.contains("[logging]"));
    }
}
