//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

/// Longest accepted page TTL (ten years).
pub(crate) const MAX_CACHE_TTL_DAYS: u64 = 3_650;

/// Longest accepted rate-limit window (one day).
pub(crate) const MAX_RATE_WINDOW_SECS: u64 = 86_400;

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_ttl_days` or `failed_ttl_secs` is 0, or the failure marker
    ///   would outlive a successful fetch
    /// - `cache_ttl_days` exceeds ten years
    /// - `rate_limit_requests` or `rate_limit_window_secs` is 0
    /// - `rate_limit_window_secs` exceeds one day
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `gather_deadline_ms` is shorter than `timeout_ms`
    /// - `max_concurrency` is 0 or exceeds 64
    /// - any character budget is 0
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_ttl_days == 0 {
            return Err(invalid("cache_ttl_days", "must be greater than 0"));
        }
        if self.failed_ttl_secs == 0 {
            return Err(invalid("failed_ttl_secs", "must be greater than 0"));
        }
        if self.cache_ttl_days > MAX_CACHE_TTL_DAYS {
            return Err(invalid("cache_ttl_days", "must not exceed 3650 days"));
        }
        let ttl_secs = self.cache_ttl_days.checked_mul(86_400).unwrap_or(u64::MAX);
        if self.failed_ttl_secs >= ttl_secs {
            return Err(invalid("failed_ttl_secs", "must be shorter than cache_ttl_days"));
        }

        if self.rate_limit_requests == 0 {
            return Err(invalid("rate_limit_requests", "must be greater than 0"));
        }
        if self.rate_limit_window_secs == 0 {
            return Err(invalid("rate_limit_window_secs", "must be greater than 0"));
        }

        if self.rate_limit_window_secs > MAX_RATE_WINDOW_SECS {
            return Err(invalid("rate_limit_window_secs", "must not exceed one day (86400s)"));
        }

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
        if self.gather_deadline_ms < self.timeout_ms {
            return Err(invalid("gather_deadline_ms", "must not be shorter than timeout_ms"));
        }

        if self.max_concurrency == 0 {
            return Err(invalid("max_concurrency", "must be at least 1"));
        }
        if self.max_concurrency > 64 {
            return Err(invalid("max_concurrency", "must not exceed 64"));
        }

        for (field, value) in [
            ("max_content_chars", self.max_content_chars),
            ("per_url_chars", self.per_url_chars),
            ("total_context_chars", self.total_context_chars),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be greater than 0"));
            }
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.per_url_chars > self.total_context_chars {
            tracing::warn!(
                per_url_chars = self.per_url_chars,
                total_context_chars = self.total_context_chars,
                "per_url_chars exceeds total_context_chars; a single URL can fill the whole block"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_field(config: AppConfig) -> String {
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => field,
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_default_config() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_ttl() {
        let config = AppConfig { cache_ttl_days: 0, ..Default::default() };
        assert_eq!(invalid_field(config), "cache_ttl_days");
    }

    #[test]
    fn test_validate_failed_ttl_not_shorter() {
        let config = AppConfig { cache_ttl_days: 1, failed_ttl_secs: 86_400, ..Default::default() };
        assert_eq!(invalid_field(config), "failed_ttl_secs");
    }

    #[test]
    fn test_validate_ttl_upper_bound() {
        let config = AppConfig { cache_ttl_days: 100_000_000, ..Default::default() };
        assert_eq!(invalid_field(config), "cache_ttl_days");

        let config = AppConfig { cache_ttl_days: u64::MAX, ..Default::default() };
        assert_eq!(invalid_field(config), "cache_ttl_days");

        let config = AppConfig { cache_ttl_days: MAX_CACHE_TTL_DAYS, ..Default::default() };
        assert!(config.validate().is_ok());
        assert!(config.cache_policy().is_ok());
    }

    #[test]
    fn test_validate_failed_ttl_beyond_any_page_ttl() {
        let config = AppConfig { failed_ttl_secs: u64::MAX, ..Default::default() };
        assert_eq!(invalid_field(config), "failed_ttl_secs");
    }

    #[test]
    fn test_validate_rate_window_upper_bound() {
        let config = AppConfig { rate_limit_window_secs: MAX_RATE_WINDOW_SECS + 1, ..Default::default() };
        assert_eq!(invalid_field(config), "rate_limit_window_secs");
    }

    #[test]
    fn test_cache_policy_rejects_unrepresentable_ttl() {
        let config = AppConfig { cache_ttl_days: u64::MAX, ..Default::default() };
        assert!(config.cache_policy().is_err());

        let config = AppConfig { cache_ttl_days: 100_000_000, ..Default::default() };
        assert!(config.cache_policy().is_err());
    }

    #[test]
    fn test_validate_rate_limit_zero() {
        let config = AppConfig { rate_limit_requests: 0, ..Default::default() };
        assert_eq!(invalid_field(config), "rate_limit_requests");

        let config = AppConfig { rate_limit_window_secs: 0, ..Default::default() };
        assert_eq!(invalid_field(config), "rate_limit_window_secs");
    }

    #[test]
    fn test_validate_timeouts() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        assert_eq!(invalid_field(config), "timeout_ms");

        let config = AppConfig { timeout_ms: 301_000, gather_deadline_ms: 400_000, ..Default::default() };
        assert_eq!(invalid_field(config), "timeout_ms");

        let config = AppConfig { timeout_ms: 10_000, gather_deadline_ms: 5_000, ..Default::default() };
        assert_eq!(invalid_field(config), "gather_deadline_ms");
    }

    #[test]
    fn test_validate_concurrency_bounds() {
        let config = AppConfig { max_concurrency: 0, ..Default::default() };
        assert_eq!(invalid_field(config), "max_concurrency");

        let config = AppConfig { max_concurrency: 65, ..Default::default() };
        assert_eq!(invalid_field(config), "max_concurrency");
    }

    #[test]
    fn test_validate_budgets() {
        let config = AppConfig { per_url_chars: 0, ..Default::default() };
        assert_eq!(invalid_field(config), "per_url_chars");
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        assert_eq!(invalid_field(config), "user_agent");
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig {
            max_bytes: 1,
            timeout_ms: 100,
            gather_deadline_ms: 100,
            max_concurrency: 1,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
