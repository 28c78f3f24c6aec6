// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values, and the
//! [`ServerConfig`] loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Root directory for ledger, beneficiaries, audit | `./data` |
//! | `JWT_SECRET` | HS256 secret for bearer tokens | Required unless built with `dev` |
//! | `JWT_ISSUER` | Expected JWT issuer claim | Optional |
//! | `TRANSFER_OTP_TTL_SECS` | Lifetime of a transfer code | `300` |
//! | `CHALLENGE_SWEEP_INTERVAL_SECS` | Expired-code sweep period | `60` |
//! | `NOTIFIER_WEBHOOK_URL` | Code delivery gateway | Optional (log only) |
//! | `NOTIFIER_WEBHOOK_SECRET` | HMAC key for gateway signatures | Optional |
//! | `LEDGER_SEED_FILE` | Clients/accounts loaded at startup | Optional |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files enabling HTTPS | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use crate::storage::paths::DATA_ROOT;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// HS256 secret shared with the identity service that issues tokens.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_ISSUER_ENV: &str = "JWT_ISSUER";

pub const OTP_TTL_ENV: &str = "TRANSFER_OTP_TTL_SECS";
pub const SWEEP_INTERVAL_ENV: &str = "CHALLENGE_SWEEP_INTERVAL_SECS";

pub const NOTIFIER_WEBHOOK_URL_ENV: &str = "NOTIFIER_WEBHOOK_URL";
pub const NOTIFIER_WEBHOOK_SECRET_ENV: &str = "NOTIFIER_WEBHOOK_SECRET";

pub const LEDGER_SEED_FILE_ENV: &str = "LEDGER_SEED_FILE";

pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_OTP_TTL_SECS: u64 = 300;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Everything the server reads from its environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// `None` only in `dev` builds, where tokens are decoded without verification.
    pub jwt_secret: Option<String>,
    pub jwt_issuer: Option<String>,
    pub otp_ttl: Duration,
    pub sweep_interval: Duration,
    pub notifier_webhook_url: Option<String>,
    pub notifier_webhook_secret: Option<String>,
    pub ledger_seed_file: Option<PathBuf>,
    /// Certificate and key paths; HTTPS only when both are set.
    pub tls: Option<(PathBuf, PathBuf)>,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get(PORT_ENV) {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: PORT_ENV,
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let jwt_secret = get(JWT_SECRET_ENV);
        if jwt_secret.is_none() && !cfg!(feature = "dev") {
            return Err(ConfigError::Missing(JWT_SECRET_ENV));
        }

        let otp_ttl = parse_secs(OTP_TTL_ENV, get(OTP_TTL_ENV), DEFAULT_OTP_TTL_SECS)?;
        if otp_ttl.is_zero() {
            return Err(ConfigError::Invalid {
                var: OTP_TTL_ENV,
                value: "0".to_string(),
                reason: "must be at least one second".to_string(),
            });
        }

        let sweep_interval = parse_secs(
            SWEEP_INTERVAL_ENV,
            get(SWEEP_INTERVAL_ENV),
            DEFAULT_SWEEP_INTERVAL_SECS,
        )?;
        if sweep_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: SWEEP_INTERVAL_ENV,
                value: "0".to_string(),
                reason: "must be at least one second".to_string(),
            });
        }

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some((PathBuf::from(cert), PathBuf::from(key))),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        let log_format = match get(LOG_FORMAT_ENV).map(|v| v.to_ascii_lowercase()) {
            None => LogFormat::Pretty,
            Some(v) if v == "pretty" => LogFormat::Pretty,
            Some(v) if v == "json" => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: LOG_FORMAT_ENV,
                    value: other,
                    reason: "expected `json` or `pretty`".to_string(),
                })
            }
        };

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            data_dir: PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DATA_ROOT.to_string())),
            jwt_secret,
            jwt_issuer: get(JWT_ISSUER_ENV),
            otp_ttl,
            sweep_interval,
            notifier_webhook_url: get(NOTIFIER_WEBHOOK_URL_ENV),
            notifier_webhook_secret: get(NOTIFIER_WEBHOOK_SECRET_ENV),
            ledger_seed_file: get(LEDGER_SEED_FILE_ENV).map(PathBuf::from),
            tls,
            log_format,
        })
    }

    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_secs(var: &'static str, raw: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    match raw {
        None => Ok(Duration::from_secs(default)),
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::Invalid {
                var,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[(JWT_SECRET_ENV, "secret")]).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.data_dir, PathBuf::from(DATA_ROOT));
        assert_eq!(config.otp_ttl, Duration::from_secs(300));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.tls.is_none());
        assert!(config.notifier_webhook_url.is_none());
    }

    #[test]
    fn overrides_are_read() {
        let config = load(&[
            (JWT_SECRET_ENV, "secret"),
            (PORT_ENV, "9000"),
            (OTP_TTL_ENV, "120"),
            (LOG_FORMAT_ENV, "JSON"),
            (TLS_CERT_PATH_ENV, "/certs/cert.pem"),
            (TLS_KEY_PATH_ENV, "/certs/key.pem"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.otp_ttl, Duration::from_secs(120));
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.tls.is_some());
    }

    #[test]
    fn invalid_numbers_are_errors() {
        let err = load(&[(JWT_SECRET_ENV, "secret"), (PORT_ENV, "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: PORT_ENV, .. }));

        let err = load(&[(JWT_SECRET_ENV, "secret"), (OTP_TTL_ENV, "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: OTP_TTL_ENV, .. }));
    }

    #[test]
    fn half_tls_configuration_is_rejected() {
        let err = load(&[(JWT_SECRET_ENV, "secret"), (TLS_CERT_PATH_ENV, "c.pem")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing(TLS_KEY_PATH_ENV));
    }

    #[cfg(not(feature = "dev"))]
    #[test]
    fn jwt_secret_is_required() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing(JWT_SECRET_ENV));
    }
}
