//! Application configuration.
//!
//! Loaded from environment variables with development defaults:
//!
//! - `TRACKWISE_API_BIND`: bind host (default `0.0.0.0`)
//! - `PORT` or `TRACKWISE_API_PORT`: port (default `3000`)
//! - `TRACKWISE_STORE`: `postgres` or `memory` (default `postgres`)
//! - `TRACKWISE_CACHE`: `redis`, `memory` or `off` (default `redis`)
//! - `TRACKWISE_LOG_FORMAT`: `json` or `pretty` (default `json`)
//!
//! Store, cache and pool settings have their own `from_env` in
//! `trackwise-storage`.

use std::net::SocketAddr;

use thiserror::Error;

use crate::error::ApiError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {var}")]
    InvalidValue { var: &'static str, value: String },
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::invalid_input(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Redis,
    Memory,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_host: String,
    pub port: u16,
    pub store: StoreKind,
    pub cache: CacheKind,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            store: StoreKind::Postgres,
            cache: CacheKind::Redis,
            log_format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let invalid = |var: &'static str, value: &str| ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        };

        let bind_host = lookup("TRACKWISE_API_BIND").unwrap_or(defaults.bind_host);

        let port = match lookup("PORT").or_else(|| lookup("TRACKWISE_API_PORT")) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| invalid("TRACKWISE_API_PORT", &raw))?,
            None => defaults.port,
        };

        let store = match lookup("TRACKWISE_STORE") {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "postgres" | "postgresql" => StoreKind::Postgres,
                "memory" => StoreKind::Memory,
                _ => return Err(invalid("TRACKWISE_STORE", &raw)),
            },
            None => defaults.store,
        };

        let cache = match lookup("TRACKWISE_CACHE") {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "redis" => CacheKind::Redis,
                "memory" => CacheKind::Memory,
                "off" | "none" | "disabled" => CacheKind::Off,
                _ => return Err(invalid("TRACKWISE_CACHE", &raw)),
            },
            None => defaults.cache,
        };

        let log_format = match lookup("TRACKWISE_LOG_FORMAT") {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" | "text" => LogFormat::Pretty,
                _ => return Err(invalid("TRACKWISE_LOG_FORMAT", &raw)),
            },
            None => defaults.log_format,
        };

        Ok(Self {
            bind_host,
            port,
            store,
            cache,
            log_format,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>().map_err(|_| ConfigError::InvalidValue {
            var: "TRACKWISE_API_BIND",
            value: self.bind_host.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bind_addr().unwrap().port(), 3000);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("TRACKWISE_API_BIND", "127.0.0.1"),
            ("TRACKWISE_API_PORT", "8080"),
            ("TRACKWISE_STORE", "memory"),
            ("TRACKWISE_CACHE", "off"),
            ("TRACKWISE_LOG_FORMAT", "pretty"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.cache, CacheKind::Off);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn test_port_env_takes_precedence() {
        let config =
            AppConfig::from_lookup(lookup(&[("PORT", "9000"), ("TRACKWISE_API_PORT", "8080")]))
                .unwrap();
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("TRACKWISE_CACHE", "memcached")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                var: "TRACKWISE_CACHE",
                value: "memcached".into()
            }
        );
        assert!(AppConfig::from_lookup(lookup(&[("PORT", "http")])).is_err());
    }
}
