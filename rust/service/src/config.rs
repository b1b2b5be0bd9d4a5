// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ingestion configuration loaded from environment variables.

use crate::breaker::CircuitBreakerConfig;
use crate::error::ConfigError;
use crate::remote::RemoteClientConfig;
use crate::service::ServiceOptions;
use std::str::FromStr;
use std::time::Duration;

/// Ingestion configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Use the remote parsing service.
    pub service_enabled: bool,
    /// Remote service base URL.
    pub service_url: String,
    /// Remote request timeout.
    pub service_timeout: Duration,
    /// Attempts for retrying remote operations.
    pub service_retries: u32,
    /// Retry parse/validate/health as well.
    pub retry_primary: bool,
    /// Use the native parser when the remote path is unavailable.
    pub fallback_enabled: bool,
    /// Maximum accepted input size in bytes.
    pub max_file_size: u64,
    pub breaker_enabled: bool,
    pub breaker_threshold: u32,
    pub breaker_recovery: Duration,
    /// Cache successful remote results on disk.
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub cache_dir: String,
}

impl IngestConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. Missing or malformed
    /// values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            service_enabled: get("IFC_SERVICE_ENABLED")
                .and_then(|v| parse_bool(&v).ok())
                .unwrap_or(defaults.service_enabled),
            service_url: get("IFC_SERVICE_URL").unwrap_or(defaults.service_url),
            service_timeout: get("IFC_SERVICE_TIMEOUT")
                .and_then(|v| parse_duration(&v).ok())
                .unwrap_or(defaults.service_timeout),
            service_retries: get("IFC_SERVICE_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.service_retries),
            retry_primary: get("IFC_SERVICE_RETRY_PRIMARY")
                .and_then(|v| parse_bool(&v).ok())
                .unwrap_or(defaults.retry_primary),
            fallback_enabled: get("IFC_FALLBACK_ENABLED")
                .and_then(|v| parse_bool(&v).ok())
                .unwrap_or(defaults.fallback_enabled),
            max_file_size: get("IFC_MAX_FILE_SIZE")
                .and_then(|v| parse_size(&v).ok())
                .unwrap_or(defaults.max_file_size),
            breaker_enabled: get("IFC_CIRCUIT_BREAKER_ENABLED")
                .and_then(|v| parse_bool(&v).ok())
                .unwrap_or(defaults.breaker_enabled),
            breaker_threshold: get("IFC_CIRCUIT_BREAKER_THRESHOLD")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.breaker_threshold),
            breaker_recovery: get("IFC_CIRCUIT_BREAKER_RECOVERY")
                .and_then(|v| parse_duration(&v).ok())
                .unwrap_or(defaults.breaker_recovery),
            cache_enabled: get("IFC_CACHE_ENABLED")
                .and_then(|v| parse_bool(&v).ok())
                .unwrap_or(defaults.cache_enabled),
            cache_ttl: get("IFC_CACHE_TTL")
                .and_then(|v| parse_duration(&v).ok())
                .unwrap_or(defaults.cache_ttl),
            cache_dir: get("IFC_CACHE_DIR").unwrap_or(defaults.cache_dir),
        }
    }

    pub fn remote_client(&self) -> RemoteClientConfig {
        RemoteClientConfig {
            base_url: self.service_url.clone(),
            timeout: self.service_timeout,
            retries: self.service_retries,
            retry_primary: self.retry_primary,
            ..RemoteClientConfig::default()
        }
    }

    pub fn circuit_breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            enabled: self.breaker_enabled,
            failure_threshold: self.breaker_threshold,
            recovery_timeout: self.breaker_recovery,
        }
    }

    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            service_enabled: self.service_enabled,
            fallback_enabled: self.fallback_enabled,
            breaker: self.circuit_breaker(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            service_enabled: true,
            service_url: "http://localhost:5000".into(),
            service_timeout: Duration::from_secs(30),
            service_retries: 3,
            retry_primary: false,
            fallback_enabled: true,
            max_file_size: 100 * 1024 * 1024,
            breaker_enabled: true,
            breaker_threshold: 5,
            breaker_recovery: Duration::from_secs(60),
            cache_enabled: true,
            cache_ttl: Duration::from_secs(60 * 60),
            cache_dir: "./.cache".into(),
        }
    }
}

/// Parse a human duration: `500ms`, `30s`, `5m`, `1h`, or bare seconds.
pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(value.to_string());
    let trimmed = value.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let amount = u64::from_str(number).map_err(|_| invalid())?;

    match unit.trim().to_ascii_lowercase().as_str() {
        "ms" => Ok(Duration::from_millis(amount)),
        "" | "s" => Ok(Duration::from_secs(amount)),
        "m" => Ok(Duration::from_secs(amount.saturating_mul(60))),
        "h" => Ok(Duration::from_secs(amount.saturating_mul(60 * 60))),
        _ => Err(invalid()),
    }
}

/// Parse a byte size: `512`, `10KB`, `100MB`, `1GB` (binary multiples).
pub fn parse_size(value: &str) -> Result<u64, ConfigError> {
    let invalid = || ConfigError::InvalidSize(value.to_string());
    let trimmed = value.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let amount = u64::from_str(number).map_err(|_| invalid())?;

    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        _ => return Err(invalid()),
    };
    amount.checked_mul(multiplier).ok_or_else(invalid)
}

fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool(value.to_string())),
    }
}
