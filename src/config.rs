// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Every tunable is read once from the environment at startup. Invalid values
//! fail startup with [`ConfigError`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SERVER_ROLE` | `all`, `main` or `auth` | `all` |
//! | `HOST` | Main API bind address | `0.0.0.0` |
//! | `PORT` | Main API bind port | `8000` |
//! | `AUTH_HOST` | Auth service bind address | `127.0.0.1` |
//! | `AUTH_PORT` | Auth service bind port | `8181` |
//! | `AUTH_SERVICE_URL` | Base URL of the auth service as seen by the main API | `http://{AUTH_HOST}:{AUTH_PORT}` |
//! | `VERIFICATION_MODE` | `remote` (HTTP) or `local` (in-process) | `remote` |
//! | `VERIFY_TIMEOUT_MS` | Remote verification timeout | `3000` |
//! | `JWT_SECRET_KEY` | HMAC signing secret | Required |
//! | `ACCESS_TOKEN_TTL_HOURS` | Access token lifetime | `24` |
//! | `REFRESH_TOKEN_TTL_DAYS` | Refresh token lifetime (7..=30) | `30` |
//! | `ADMIN_BYPASS` | Admin role authorized for every operation | `true` |
//! | `CREDENTIALS_DB_PATH` | redb file holding users and refresh tokens | `data/credentials.redb` |
//! | `SEED_USERS` | `user:pass:role[:customer_id]`, comma separated | unset |
//! | `SHUTDOWN_GRACE_SECS` | Drain window on shutdown | `5` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::store::NewUser;
use crate::auth::token::{MAX_REFRESH_TTL_DAYS, MIN_REFRESH_TTL_DAYS};

pub const SERVER_ROLE_ENV: &str = "SERVER_ROLE";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const AUTH_HOST_ENV: &str = "AUTH_HOST";
pub const AUTH_PORT_ENV: &str = "AUTH_PORT";
pub const AUTH_SERVICE_URL_ENV: &str = "AUTH_SERVICE_URL";
pub const VERIFICATION_MODE_ENV: &str = "VERIFICATION_MODE";
pub const VERIFY_TIMEOUT_MS_ENV: &str = "VERIFY_TIMEOUT_MS";
pub const JWT_SECRET_KEY_ENV: &str = "JWT_SECRET_KEY";
pub const ACCESS_TOKEN_TTL_HOURS_ENV: &str = "ACCESS_TOKEN_TTL_HOURS";
pub const REFRESH_TOKEN_TTL_DAYS_ENV: &str = "REFRESH_TOKEN_TTL_DAYS";
pub const ADMIN_BYPASS_ENV: &str = "ADMIN_BYPASS";
pub const CREDENTIALS_DB_PATH_ENV: &str = "CREDENTIALS_DB_PATH";
pub const SEED_USERS_ENV: &str = "SEED_USERS";
pub const SHUTDOWN_GRACE_SECS_ENV: &str = "SHUTDOWN_GRACE_SECS";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_AUTH_HOST: &str = "127.0.0.1";
pub const DEFAULT_AUTH_PORT: u16 = 8181;
pub const DEFAULT_VERIFY_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_ACCESS_TOKEN_TTL_HOURS: i64 = 24;
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 30;
pub const DEFAULT_CREDENTIALS_DB_PATH: &str = "data/credentials.redb";
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Which servers this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerRole {
    /// Auth server first, then the main API, in one process
    All,
    Main,
    Auth,
}

/// How the main API verifies tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMode {
    Local,
    Remote,
}

#[derive(Clone)]
pub struct Config {
    pub server_role: ServerRole,
    pub host: String,
    pub port: u16,
    pub auth_host: String,
    pub auth_port: u16,
    pub auth_service_url: String,
    pub verification_mode: VerificationMode,
    pub verify_timeout: Duration,
    pub jwt_secret: String,
    pub access_token_ttl_hours: i64,
    pub refresh_token_ttl_days: i64,
    pub admin_bypass: bool,
    pub credentials_db_path: PathBuf,
    pub seed_users: Vec<NewUser>,
    pub shutdown_grace: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_role", &self.server_role)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("auth_host", &self.auth_host)
            .field("auth_port", &self.auth_port)
            .field("auth_service_url", &self.auth_service_url)
            .field("verification_mode", &self.verification_mode)
            .field("verify_timeout", &self.verify_timeout)
            .field("jwt_secret", &"<redacted>")
            .field("access_token_ttl_hours", &self.access_token_ttl_hours)
            .field("refresh_token_ttl_days", &self.refresh_token_ttl_days)
            .field("admin_bypass", &self.admin_bypass)
            .field("credentials_db_path", &self.credentials_db_path)
            .field("seed_users", &self.seed_users.len())
            .field("shutdown_grace", &self.shutdown_grace)
            .finish()
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        fn parsed<T: std::str::FromStr>(
            raw: Option<String>,
            key: &'static str,
            default: T,
        ) -> Result<T, ConfigError> {
            match raw {
                Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidValue(key)),
                None => Ok(default),
            }
        }

        let server_role = match var(SERVER_ROLE_ENV).map(|v| v.trim().to_ascii_lowercase()) {
            None => ServerRole::All,
            Some(v) => match v.as_str() {
                "all" => ServerRole::All,
                "main" => ServerRole::Main,
                "auth" => ServerRole::Auth,
                _ => return Err(ConfigError::InvalidValue(SERVER_ROLE_ENV)),
            },
        };

        let host = var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parsed(var(PORT_ENV), PORT_ENV, DEFAULT_PORT)?;
        let auth_host = var(AUTH_HOST_ENV).unwrap_or_else(|| DEFAULT_AUTH_HOST.to_string());
        let auth_port = parsed(var(AUTH_PORT_ENV), AUTH_PORT_ENV, DEFAULT_AUTH_PORT)?;

        let auth_service_url = var(AUTH_SERVICE_URL_ENV)
            .unwrap_or_else(|| format!("http://{auth_host}:{auth_port}"));
        url::Url::parse(&auth_service_url)
            .map_err(|_| ConfigError::InvalidValue(AUTH_SERVICE_URL_ENV))?;

        let verification_mode = match var(VERIFICATION_MODE_ENV).map(|v| v.trim().to_ascii_lowercase()) {
            None => VerificationMode::Remote,
            Some(v) => match v.as_str() {
                "remote" => VerificationMode::Remote,
                "local" => VerificationMode::Local,
                _ => return Err(ConfigError::InvalidValue(VERIFICATION_MODE_ENV)),
            },
        };

        let verify_timeout_ms = parsed(var(VERIFY_TIMEOUT_MS_ENV), VERIFY_TIMEOUT_MS_ENV, DEFAULT_VERIFY_TIMEOUT_MS)?;
        if verify_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(VERIFY_TIMEOUT_MS_ENV));
        }

        let jwt_secret = var(JWT_SECRET_KEY_ENV).ok_or(ConfigError::MissingEnv(JWT_SECRET_KEY_ENV))?;

        let access_token_ttl_hours = parsed(
            var(ACCESS_TOKEN_TTL_HOURS_ENV),
            ACCESS_TOKEN_TTL_HOURS_ENV,
            DEFAULT_ACCESS_TOKEN_TTL_HOURS,
        )?;
        if access_token_ttl_hours <= 0 {
            return Err(ConfigError::InvalidValue(ACCESS_TOKEN_TTL_HOURS_ENV));
        }

        let refresh_token_ttl_days = parsed(
            var(REFRESH_TOKEN_TTL_DAYS_ENV),
            REFRESH_TOKEN_TTL_DAYS_ENV,
            DEFAULT_REFRESH_TOKEN_TTL_DAYS,
        )?;
        if !(MIN_REFRESH_TTL_DAYS..=MAX_REFRESH_TTL_DAYS).contains(&refresh_token_ttl_days) {
            return Err(ConfigError::InvalidValue(REFRESH_TOKEN_TTL_DAYS_ENV));
        }

        let admin_bypass = match var(ADMIN_BYPASS_ENV) {
            None => true,
            Some(v) => parse_bool(&v).ok_or(ConfigError::InvalidValue(ADMIN_BYPASS_ENV))?,
        };

        let credentials_db_path = PathBuf::from(
            var(CREDENTIALS_DB_PATH_ENV).unwrap_or_else(|| DEFAULT_CREDENTIALS_DB_PATH.to_string()),
        );

        let seed_users = match var(SEED_USERS_ENV) {
            None => Vec::new(),
            Some(raw) => raw
                .split(',')
                .filter(|entry| !entry.trim().is_empty())
                .map(|entry| NewUser::parse_seed(entry).ok_or(ConfigError::InvalidValue(SEED_USERS_ENV)))
                .collect::<Result<Vec<_>, _>>()?,
        };

        let shutdown_grace_secs = parsed(
            var(SHUTDOWN_GRACE_SECS_ENV),
            SHUTDOWN_GRACE_SECS_ENV,
            DEFAULT_SHUTDOWN_GRACE_SECS,
        )?;

        Ok(Self {
            server_role,
            host,
            port,
            auth_host,
            auth_port,
            auth_service_url,
            verification_mode,
            verify_timeout: Duration::from_millis(verify_timeout_ms),
            jwt_secret,
            access_token_ttl_hours,
            refresh_token_ttl_days,
            admin_bypass,
            credentials_db_path,
            seed_users,
            shutdown_grace: Duration::from_secs(shutdown_grace_secs),
        })
    }

    pub fn main_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn auth_addr(&self) -> String {
        format!("{}:{}", self.auth_host, self.auth_port)
    }
}
