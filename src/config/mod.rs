//! Service configuration
//!
//! Settings come from a YAML file (`config.yml` unless `--config` says
//! otherwise) and are then overridden by `SHOPEASE_*` environment variables.
//! A missing or empty file means "all defaults".

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "SHOPEASE_";

/// Development fallback; `main` warns when it is still in use.
pub const DEFAULT_JWT_SECRET: &str = "default-secret-key";

/// Longest accepted token lifetime (ten years)
pub const MAX_JWT_EXPIRY_HOURS: u64 = 87_600;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Listener and CORS settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed by CORS; `*` mirrors the caller's origin
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// File path or `sqlite:` URL for SQLite, `mysql://` URL for MySQL
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Fill an empty catalog with the stock items on startup
    #[serde(default = "default_seed_items")]
    pub seed_items: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
            seed_items: default_seed_items(),
        }
    }
}

fn default_database_url() -> String {
    "shopease.db".to_string()
}

fn default_seed_items() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Sqlite,
    Mysql,
}

impl FromStr for DatabaseDriver {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "mysql" => Ok(Self::Mysql),
            other => Err(ConfigError::Invalid(format!("unknown database driver '{}'", other))),
        }
    }
}

/// Bearer token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_jwt_expiry_hours")]
    pub jwt_expiry_hours: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            jwt_expiry_hours: default_jwt_expiry_hours(),
        }
    }
}

fn default_jwt_secret() -> String {
    DEFAULT_JWT_SECRET.to_string()
}

fn default_jwt_expiry_hours() -> u64 {
    24
}

impl AuthConfig {
    /// Whether the signing secret is still the built-in development value
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Cannot parse {path}: {reason}")]
    Parse { path: String, reason: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Read the YAML file at `path`; defaults when it is absent or blank.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&raw).map_err(|e| {
            let reason = match e.location() {
                Some(at) => format!("line {} column {}: {}", at.line(), at.column(), e),
                None => e.to_string(),
            };
            ConfigError::Parse {
                path: path.display().to_string(),
                reason,
            }
            .into()
        })
    }

    /// `load`, then environment overrides, then `validate`.
    ///
    /// Recognised variables: `SHOPEASE_SERVER_HOST`, `SHOPEASE_SERVER_PORT`,
    /// `SHOPEASE_SERVER_ALLOWED_ORIGINS` (comma separated),
    /// `SHOPEASE_DATABASE_DRIVER`, `SHOPEASE_DATABASE_URL`,
    /// `SHOPEASE_DATABASE_SEED_ITEMS`, `SHOPEASE_AUTH_JWT_SECRET` and
    /// `SHOPEASE_AUTH_JWT_EXPIRY_HOURS`.
    pub fn load_with_env(path: &Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("auth.jwt_secret must not be empty".into()));
        }
        if self.auth.jwt_expiry_hours == 0 {
            return Err(ConfigError::Invalid(
                "auth.jwt_expiry_hours must be greater than zero".into(),
            ));
        }
        if self.auth.jwt_expiry_hours > MAX_JWT_EXPIRY_HOURS {
            return Err(ConfigError::Invalid(format!(
                "auth.jwt_expiry_hours must be at most {}",
                MAX_JWT_EXPIRY_HOURS
            )));
        }
        Ok(())
    }

    /// Overlay values from `lookup` (keyed without the prefix).
    ///
    /// Values that fail to parse are logged and skipped.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("SERVER_HOST") {
            self.server.host = host;
        }
        override_parsed(&lookup, "SERVER_PORT", &mut self.server.port);
        if let Some(raw) = lookup("SERVER_ALLOWED_ORIGINS") {
            let origins: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
            if !origins.is_empty() {
                self.server.allowed_origins = origins;
            }
        }

        override_parsed(&lookup, "DATABASE_DRIVER", &mut self.database.driver);
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        override_parsed(&lookup, "DATABASE_SEED_ITEMS", &mut self.database.seed_items);

        if let Some(secret) = lookup("AUTH_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        override_parsed(&lookup, "AUTH_JWT_EXPIRY_HOURS", &mut self.auth.jwt_expiry_hours);
    }
}

fn override_parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) {
    if let Some(raw) = lookup(key) {
        match raw.parse() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!(
                key = %format!("{}{}", ENV_PREFIX, key),
                value = %raw,
                "Ignoring unparsable override"
            ),
        }
    }
}
