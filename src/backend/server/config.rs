/**
 * Server Configuration
 *
 * Configuration is resolved in three layers, later ones winning:
 *
 * 1. Built-in defaults suitable for local development
 * 2. An optional TOML file named by `BOARDSYNC_CONFIG`
 * 3. Environment variables (a `.env` file is loaded first by the binary)
 *
 * # Environment Variables
 *
 * - `BIND_ADDR`, `SERVER_PORT`
 * - `DATABASE_URL` - absent means the in-memory store
 * - `DATABASE_MAX_CONNECTIONS`
 * - `JWT_SECRET`
 * - `LOCK_TTL_MS`, `PRESENCE_TTL_SECS`, `TYPING_TTL_SECS`, `SWEEP_INTERVAL_SECS`
 * - `ACCESS_POLICY` - `owner` or `any`
 * - `CONNECTION_BUFFER`
 */

use crate::backend::board::PolicyKind;
use crate::shared::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Secret used when none is configured; never acceptable outside development
pub const DEV_JWT_SECRET: &str = "boardsync-dev-secret-change-me";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub jwt_secret: String,
    pub lock_ttl_ms: u64,
    pub presence_ttl_secs: u64,
    pub typing_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub access_policy: PolicyKind,
    pub connection_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 3000,
            database_url: None,
            max_connections: 5,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            lock_ttl_ms: 5000,
            presence_ttl_secs: 3600,
            typing_ttl_secs: 30,
            sweep_interval_secs: 60,
            access_policy: PolicyKind::Owner,
            connection_buffer: 64,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

fn parse_var<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue(name, format!("'{}': {}", raw, e)))
}

impl ServerConfig {
    /// Resolve the configuration from the process environment
    pub fn load() -> Result<Self, ConfigLoadError> {
        Self::load_with(|name| std::env::var(name).ok())
    }

    /// Resolve the configuration with a custom variable lookup
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = match lookup("BOARDSYNC_CONFIG") {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        let config = base.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: display.clone(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigLoadError::Toml {
            path: display,
            source,
        })
    }

    fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = lookup("SERVER_PORT") {
            self.port = parse_var("SERVER_PORT", &v)?;
        }
        if let Some(v) = lookup("DATABASE_URL") {
            self.database_url = Some(v).filter(|url| !url.trim().is_empty());
        }
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.max_connections = parse_var("DATABASE_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = lookup("JWT_SECRET") {
            self.jwt_secret = v;
        }
        if let Some(v) = lookup("LOCK_TTL_MS") {
            self.lock_ttl_ms = parse_var("LOCK_TTL_MS", &v)?;
        }
        if let Some(v) = lookup("PRESENCE_TTL_SECS") {
            self.presence_ttl_secs = parse_var("PRESENCE_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("TYPING_TTL_SECS") {
            self.typing_ttl_secs = parse_var("TYPING_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("SWEEP_INTERVAL_SECS") {
            self.sweep_interval_secs = parse_var("SWEEP_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = lookup("ACCESS_POLICY") {
            self.access_policy = v
                .parse()
                .map_err(|e: crate::shared::SharedError| {
                    ConfigError::InvalidValue("ACCESS_POLICY", e.to_string())
                })?;
        }
        if let Some(v) = lookup("CONNECTION_BUFFER") {
            self.connection_buffer = parse_var("CONNECTION_BUFFER", &v)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingValue("JWT_SECRET"));
        }
        for (name, value) in [
            ("LOCK_TTL_MS", self.lock_ttl_ms),
            ("PRESENCE_TTL_SECS", self.presence_ttl_secs),
            ("TYPING_TTL_SECS", self.typing_ttl_secs),
            ("SWEEP_INTERVAL_SECS", self.sweep_interval_secs),
            ("CONNECTION_BUFFER", self.connection_buffer as u64),
            ("DATABASE_MAX_CONNECTIONS", self.max_connections as u64),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue(name, "must be greater than 0".to_string()));
            }
        }
        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(ConfigError::InvalidUrl(url.clone()));
            }
        }
        Ok(())
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }

    pub fn presence_ttl(&self) -> Duration {
        Duration::from_secs(self.presence_ttl_secs)
    }

    pub fn typing_ttl(&self) -> Duration {
        Duration::from_secs(self.typing_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
