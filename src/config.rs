// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pipeline Configuration
//!
//! Tunables for the orchestrator and ingestion stage, loadable from the
//! environment:
//!
//! | Variable                       | Default |
//! |--------------------------------|---------|
//! | `DISCOVERY_MAX_HOSTS`          | 20      |
//! | `DISCOVERY_QUERY_TIMEOUT`      | 60      |
//! | `DISCOVERY_INGEST_CONCURRENCY` | 4       |
//! | `DISCOVERY_STOP_ON_ERROR`      | true    |

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;

/// Discovery pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Hosts processed concurrently by one orchestrator run
    pub max_concurrent_hosts: usize,

    /// Upper bound on a single query, in seconds
    pub query_timeout_secs: u64,

    /// Hosts ingested concurrently (logs of one host stay sequential)
    pub ingest_concurrency: usize,

    /// Halt a replay batch at the first failing log
    pub stop_on_error: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_concurrent_hosts: 20,
            query_timeout_secs: 60,
            ingest_concurrency: 4,
            stop_on_error: true,
        }
    }
}

impl DiscoveryConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            max_concurrent_hosts: parse_var(
                &lookup,
                "DISCOVERY_MAX_HOSTS",
                defaults.max_concurrent_hosts,
            )?,
            query_timeout_secs: parse_var(
                &lookup,
                "DISCOVERY_QUERY_TIMEOUT",
                defaults.query_timeout_secs,
            )?,
            ingest_concurrency: parse_var(
                &lookup,
                "DISCOVERY_INGEST_CONCURRENCY",
                defaults.ingest_concurrency,
            )?,
            stop_on_error: parse_bool(&lookup, "DISCOVERY_STOP_ON_ERROR", defaults.stop_on_error)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("DISCOVERY_MAX_HOSTS", self.max_concurrent_hosts as u64),
            ("DISCOVERY_QUERY_TIMEOUT", self.query_timeout_secs),
            ("DISCOVERY_INGEST_CONCURRENCY", self.ingest_concurrency as u64),
        ];

        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError::InvalidValue {
                name: name.to_string(),
                value,
                reason: e.to_string(),
            })
        }
        None => Ok(default),
    }
}

/// Boolean flags accept `true/false`, `1/0`, `yes/no`
pub(crate) fn parse_bool<F>(lookup: &F, name: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                name: name.to_string(),
                value,
                reason: "expected a boolean".to_string(),
            }),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DiscoveryConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, DiscoveryConfig::default());
        assert_eq!(config.query_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_overrides() {
        let config = DiscoveryConfig::from_lookup(lookup(&[
            ("DISCOVERY_MAX_HOSTS", "5"),
            ("DISCOVERY_STOP_ON_ERROR", "no"),
        ]))
        .unwrap();

        assert_eq!(config.max_concurrent_hosts, 5);
        assert!(!config.stop_on_error);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let result = DiscoveryConfig::from_lookup(lookup(&[("DISCOVERY_QUERY_TIMEOUT", "soon")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

        let result = DiscoveryConfig::from_lookup(lookup(&[("DISCOVERY_MAX_HOSTS", "0")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: DiscoveryConfig =
            serde_json::from_value(serde_json::json!({"ingest_concurrency": 8})).unwrap();
        assert_eq!(config.ingest_concurrency, 8);
        assert_eq!(config.max_concurrent_hosts, 20);
    }
}
