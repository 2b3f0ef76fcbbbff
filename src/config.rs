// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the [`AppConfig`] loaded from
//! them at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory holding `ledger.redb` | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWT_SECRET` | HS256 secret for user bearer tokens | Required |
//! | `API_KEY_PEPPER` | HMAC key for API key hashing | `JWT_SECRET` |
//! | `PAYSTACK_SECRET_KEY` | Gateway API key and webhook HMAC key | Required |
//! | `PAYSTACK_BASE_URL` | Gateway API base URL | `https://api.paystack.co` |
//! | `PAYSTACK_CALLBACK_URL` | Redirect after checkout | Optional |
//! | `KEY_SWEEP_INTERVAL_SECS` | Expired key sweep interval | `300` |
//! | `HISTORY_CACHE_CAPACITY` | Wallet histories kept in memory | `1024` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use crate::storage::database::DEFAULT_HISTORY_CACHE_CAPACITY;

pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const API_KEY_PEPPER_ENV: &str = "API_KEY_PEPPER";
pub const PAYSTACK_SECRET_KEY_ENV: &str = "PAYSTACK_SECRET_KEY";
pub const PAYSTACK_BASE_URL_ENV: &str = "PAYSTACK_BASE_URL";
pub const PAYSTACK_CALLBACK_URL_ENV: &str = "PAYSTACK_CALLBACK_URL";
pub const KEY_SWEEP_INTERVAL_ENV: &str = "KEY_SWEEP_INTERVAL_SECS";
pub const HISTORY_CACHE_CAPACITY_ENV: &str = "HISTORY_CACHE_CAPACITY";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_PAYSTACK_BASE_URL: &str = "https://api.paystack.co";
pub const DEFAULT_KEY_SWEEP_INTERVAL_SECS: u64 = 300;

/// Database file name inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "ledger.redb";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Payment gateway settings.
#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub secret_key: String,
    pub base_url: String,
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub api_key_pepper: String,
    pub paystack: PaystackConfig,
    pub key_sweep_interval: Duration,
    pub history_cache_capacity: usize,
    pub json_logs: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));

        let jwt_secret = required(JWT_SECRET_ENV)?;
        let api_key_pepper = optional(API_KEY_PEPPER_ENV).unwrap_or_else(|| jwt_secret.clone());

        Ok(Self {
            data_dir: PathBuf::from(
                optional(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            ),
            host: optional(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(optional(PORT_ENV), PORT_ENV, DEFAULT_PORT)?,
            jwt_secret,
            api_key_pepper,
            paystack: PaystackConfig {
                secret_key: required(PAYSTACK_SECRET_KEY_ENV)?,
                base_url: optional(PAYSTACK_BASE_URL_ENV)
                    .unwrap_or_else(|| DEFAULT_PAYSTACK_BASE_URL.to_string()),
                callback_url: optional(PAYSTACK_CALLBACK_URL_ENV),
            },
            key_sweep_interval: Duration::from_secs(parse_or(
                optional(KEY_SWEEP_INTERVAL_ENV),
                KEY_SWEEP_INTERVAL_ENV,
                DEFAULT_KEY_SWEEP_INTERVAL_SECS,
            )?),
            history_cache_capacity: parse_or(
                optional(HISTORY_CACHE_CAPACITY_ENV),
                HISTORY_CACHE_CAPACITY_ENV,
                DEFAULT_HISTORY_CACHE_CAPACITY,
            )?,
            json_logs: optional(LOG_FORMAT_ENV)
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = AppConfig::from_lookup(lookup(&[
            (JWT_SECRET_ENV, "jwt"),
            (PAYSTACK_SECRET_KEY_ENV, "sk_test"),
        ]))
        .unwrap();

        assert_eq!(config.database_path(), PathBuf::from("./data/ledger.redb"));
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.api_key_pepper, "jwt");
        assert_eq!(config.paystack.base_url, DEFAULT_PAYSTACK_BASE_URL);
        assert!(config.paystack.callback_url.is_none());
        assert_eq!(config.key_sweep_interval, Duration::from_secs(300));
        assert_eq!(config.history_cache_capacity, DEFAULT_HISTORY_CACHE_CAPACITY);
        assert!(!config.json_logs);
    }

    #[test]
    fn missing_secrets_are_reported() {
        let err = AppConfig::from_lookup(lookup(&[(PAYSTACK_SECRET_KEY_ENV, "sk")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(JWT_SECRET_ENV)));

        let err = AppConfig::from_lookup(lookup(&[(JWT_SECRET_ENV, "jwt"), (PAYSTACK_SECRET_KEY_ENV, "  ")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(PAYSTACK_SECRET_KEY_ENV)));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = AppConfig::from_lookup(lookup(&[
            (JWT_SECRET_ENV, "jwt"),
            (API_KEY_PEPPER_ENV, "pepper"),
            (PAYSTACK_SECRET_KEY_ENV, "sk"),
            (PORT_ENV, "9090"),
            (KEY_SWEEP_INTERVAL_ENV, "60"),
            (LOG_FORMAT_ENV, "JSON"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.api_key_pepper, "pepper");
        assert_eq!(config.key_sweep_interval, Duration::from_secs(60));
        assert!(config.json_logs);

        let err = AppConfig::from_lookup(lookup(&[
            (JWT_SECRET_ENV, "jwt"),
            (PAYSTACK_SECRET_KEY_ENV, "sk"),
            (PORT_ENV, "http"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: PORT_ENV, .. }));
    }
}
