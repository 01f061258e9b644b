//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use crate::url::is_http;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

/// Namespace name components are joined with `-`, so they must not contain it.
fn check_name_component(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Missing { field: field.into(), hint: "must not be empty".into() });
    }
    if value.contains('-') || value.chars().any(char::is_whitespace) {
        return Err(invalid(field, "must not contain '-' or whitespace"));
    }
    Ok(())
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - `cache_prefix` or `cache_version` contain `-` or whitespace
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is outside 100ms..=5 minutes
    /// - `probe_timeout_ms` is below 100ms or above `timeout_ms`
    /// - a concurrency limit is outside 1..=64
    /// - `probe_path` or `offline_page` is not a same-origin path
    /// - a manifest entry is neither a local path nor an allow-listed CDN URL
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = self.origin_url()?;
        if !is_http(&origin) {
            return Err(invalid("origin", "must be an http(s) URL"));
        }

        check_name_component("cache_prefix", &self.cache_prefix)?;
        check_name_component("cache_version", &self.cache_version)?;

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.probe_timeout_ms < 100 {
            return Err(invalid("probe_timeout_ms", "must be at least 100ms"));
        }
        if self.probe_timeout_ms > self.timeout_ms {
            return Err(invalid("probe_timeout_ms", "must not exceed timeout_ms"));
        }

        for (field, value) in [
            ("preload_concurrency", self.preload_concurrency),
            ("revalidate_concurrency", self.revalidate_concurrency),
        ] {
            if !(1..=64).contains(&value) {
                return Err(invalid(field, "must be between 1 and 64"));
            }
        }

        for (field, value) in [("probe_path", &self.probe_path), ("offline_page", &self.offline_page)] {
            if !value.starts_with('/') {
                return Err(invalid(field, "must be a path starting with '/'"));
            }
        }

        let manifest = self.asset_manifest();
        manifest
            .check_external_hosts(&self.classifier.cdn_hosts)
            .map_err(|reason| invalid("manifest", reason))?;

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if manifest.is_empty() {
            tracing::warn!("manifest is empty; install will not warm any assets");
        }

        Ok(())
    }
}
