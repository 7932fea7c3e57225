// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read once from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Database, uploads and audit log | `./data` |
//! | `JWT_SECRET` | HS256 secret for session tokens | random per boot |
//! | `TOKEN_TTL_SECS` | Session token lifetime | `604800` |
//! | `PUBLIC_BASE_URL` | Base for invitation links and file URLs | `http://localhost:8080` |
//! | `EXPIRY_SWEEP_INTERVAL_SECS` | Background expiry sweep period | `300` |
//! | `SEED_ADMIN_PHONE` / `SEED_ADMIN_PASSWORD` | Bootstrap admin account | unset |
//! | `AI_API_URL` / `AI_API_KEY` | Chat-completions endpoint for batch parsing | unset |
//! | `AI_MODEL` | Model name sent to that endpoint | `deepseek-chat` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::providers::ChatSettings;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const TOKEN_TTL_ENV: &str = "TOKEN_TTL_SECS";
pub const PUBLIC_BASE_URL_ENV: &str = "PUBLIC_BASE_URL";
pub const EXPIRY_SWEEP_INTERVAL_ENV: &str = "EXPIRY_SWEEP_INTERVAL_SECS";
pub const SEED_ADMIN_PHONE_ENV: &str = "SEED_ADMIN_PHONE";
pub const SEED_ADMIN_PASSWORD_ENV: &str = "SEED_ADMIN_PASSWORD";
pub const AI_API_URL_ENV: &str = "AI_API_URL";
pub const AI_API_KEY_ENV: &str = "AI_API_KEY";
pub const AI_MODEL_ENV: &str = "AI_MODEL";

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_AI_MODEL: &str = "deepseek-chat";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Bootstrap admin credentials.
#[derive(Debug, Clone)]
pub struct SeedAdmin {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    /// `None` means a random secret is generated at boot.
    pub jwt_secret: Option<String>,
    pub token_ttl: Duration,
    pub public_base_url: String,
    pub sweep_interval: Duration,
    pub seed_admin: Option<SeedAdmin>,
    pub ai: Option<ChatSettings>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host = get(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_or(get(PORT_ENV), PORT_ENV, 8080)?;
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| invalid(HOST_ENV, format!("{host}:{port}: {e}")))?;

        let token_ttl = parse_or(get(TOKEN_TTL_ENV), TOKEN_TTL_ENV, DEFAULT_TOKEN_TTL_SECS)?;
        if token_ttl == 0 {
            return Err(invalid(TOKEN_TTL_ENV, "must be positive"));
        }
        let sweep_interval = parse_or(
            get(EXPIRY_SWEEP_INTERVAL_ENV),
            EXPIRY_SWEEP_INTERVAL_ENV,
            DEFAULT_SWEEP_INTERVAL_SECS,
        )?;
        if sweep_interval == 0 {
            return Err(invalid(EXPIRY_SWEEP_INTERVAL_ENV, "must be positive"));
        }

        let public_base_url = get(PUBLIC_BASE_URL_ENV)
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&public_base_url)
            .map_err(|e| invalid(PUBLIC_BASE_URL_ENV, e.to_string()))?;

        let seed_admin = match (get(SEED_ADMIN_PHONE_ENV), get(SEED_ADMIN_PASSWORD_ENV)) {
            (Some(phone), Some(password)) => Some(SeedAdmin { phone, password }),
            (None, None) => None,
            _ => {
                return Err(invalid(
                    SEED_ADMIN_PHONE_ENV,
                    "SEED_ADMIN_PHONE and SEED_ADMIN_PASSWORD must be set together",
                ))
            }
        };

        let ai = match (get(AI_API_URL_ENV), get(AI_API_KEY_ENV)) {
            (Some(api_url), Some(api_key)) => Some(ChatSettings {
                api_url,
                api_key,
                model: get(AI_MODEL_ENV).unwrap_or_else(|| DEFAULT_AI_MODEL.to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            bind_addr,
            data_dir: PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())),
            jwt_secret: get(JWT_SECRET_ENV),
            token_ttl: Duration::from_secs(token_ttl),
            public_base_url,
            sweep_interval: Duration::from_secs(sweep_interval),
            seed_admin,
            ai,
        })
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.into(),
    }
}

fn parse_or<T>(value: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.parse().map_err(|e: T::Err| invalid(name, format!("{raw}: {e}"))),
        None => Ok(default),
    }
}
