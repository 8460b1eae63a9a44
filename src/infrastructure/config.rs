//! Runtime configuration, read from `BOOKSHELF_*` environment variables
//! (a `.env` file is loaded first when present).

use crate::domain::cover::DEFAULT_MAX_COVER_BYTES;
use crate::infrastructure::security::{DEFAULT_TOKEN_TTL_SECS, MAX_TOKEN_TTL_SECS};
use config::{Config, Environment};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

pub const ENV_PREFIX: &str = "BOOKSHELF";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),
    #[error("Invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },
    #[error(transparent)]
    Source(#[from] config::ConfigError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

/// Settings as they come out of the environment, before cross-field checks.
#[derive(Debug, Deserialize)]
struct RawConfig {
    host: String,
    port: u16,
    jwt_secret: Option<String>,
    token_ttl_secs: u64,
    cover_dir: PathBuf,
    max_cover_bytes: usize,
    log_level: String,
    cors_origin: Option<String>,
    admin_email: Option<String>,
    admin_password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub cover_dir: PathBuf,
    pub max_cover_bytes: usize,
    pub log_level: String,
    pub cors_origin: Option<String>,
    pub admin: Option<AdminSeed>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    /// Layers `env` over the built-in defaults and validates the result.
    pub fn from_source(env: Environment) -> Result<Self, ConfigError> {
        let raw: RawConfig = Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8080_i64)?
            .set_default("token_ttl_secs", DEFAULT_TOKEN_TTL_SECS as i64)?
            .set_default("cover_dir", "uploads/covers")?
            .set_default("max_cover_bytes", DEFAULT_MAX_COVER_BYTES as i64)?
            .set_default("log_level", "info")?
            .add_source(env)
            .build()?
            .try_deserialize()?;

        raw.validate()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// JSON body limit large enough for a base64-encoded cover.
    pub fn json_limit(&self) -> usize {
        self.max_cover_bytes / 3 * 4 + 64 * 1024
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl RawConfig {
    fn validate(self) -> Result<AppConfig, ConfigError> {
        let jwt_secret =
            non_blank(self.jwt_secret).ok_or(ConfigError::Missing("BOOKSHELF_JWT_SECRET"))?;

        if self.token_ttl_secs == 0 || self.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(ConfigError::Invalid {
                key: "BOOKSHELF_TOKEN_TTL_SECS",
                value: self.token_ttl_secs.to_string(),
            });
        }

        let admin = match (non_blank(self.admin_email), non_blank(self.admin_password)) {
            (Some(email), Some(password)) => Some(AdminSeed { email, password }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("BOOKSHELF_ADMIN_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Missing("BOOKSHELF_ADMIN_EMAIL")),
        };

        Ok(AppConfig {
            host: self.host,
            port: self.port,
            jwt_secret,
            token_ttl_secs: self.token_ttl_secs,
            cover_dir: self.cover_dir,
            max_cover_bytes: self.max_cover_bytes,
            log_level: self.log_level,
            cors_origin: non_blank(self.cors_origin),
            admin,
        })
    }
}
