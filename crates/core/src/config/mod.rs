//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (WEBCTX_*)
//! 2. TOML config file (if WEBCTX_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::CachePolicy;
use crate::ratelimit::RateLimit;

mod validation;

pub use validation::ConfigError;
use validation::MAX_RATE_WINDOW_SECS;

/// Where fetched content is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local map; lost on restart.
    Memory,
    /// SQLite database at `db_path`.
    Sqlite,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (WEBCTX_*)
/// 2. TOML config file (if WEBCTX_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// JSON document mapping tags to URL sets.
    ///
    /// Set via WEBCTX_CONTEXT_SETS_PATH environment variable.
    #[serde(default = "default_context_sets_path")]
    pub context_sets_path: PathBuf,

    /// Cache backend: "sqlite" (default) or "memory".
    #[serde(default = "default_cache_backend")]
    pub cache_backend: CacheBackend,

    /// Path to SQLite cache database.
    ///
    /// Set via WEBCTX_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Lifetime of a successfully fetched page.
    #[serde(default = "default_cache_ttl_days")]
    pub cache_ttl_days: u64,

    /// Lifetime of a failure marker; must be shorter than the page TTL.
    #[serde(default = "default_failed_ttl_secs")]
    pub failed_ttl_secs: u64,

    /// Admitted fetches per domain per window.
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: u32,

    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via WEBCTX_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Per-fetch timeout in milliseconds.
    ///
    /// Set via WEBCTX_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Outer deadline for one gather operation, in milliseconds.
    #[serde(default = "default_gather_deadline_ms")]
    pub gather_deadline_ms: u64,

    /// Maximum fetches in flight per gather operation.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Characters of extracted text kept per fetched page.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Characters per URL in the assembled context block.
    #[serde(default = "default_per_url_chars")]
    pub per_url_chars: usize,

    /// Characters in the whole assembled context block.
    #[serde(default = "default_total_context_chars")]
    pub total_context_chars: usize,

    /// Whether to respect robots.txt rules.
    ///
    /// Set via WEBCTX_RESPECT_ROBOTS environment variable.
    #[serde(default = "default_true")]
    pub respect_robots: bool,

    /// Refuse hosts that resolve to private or reserved addresses.
    #[serde(default = "default_true")]
    pub block_private_hosts: bool,

    /// Interval of the background cache sweep; 0 disables it.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_context_sets_path() -> PathBuf {
    PathBuf::from("./context_sets.json")
}

fn default_cache_backend() -> CacheBackend {
    CacheBackend::Sqlite
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./webctx-cache.sqlite")
}

fn default_cache_ttl_days() -> u64 {
    14
}

fn default_failed_ttl_secs() -> u64 {
    3_600
}

fn default_rate_limit_requests() -> u32 {
    10
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    "webctx/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_gather_deadline_ms() -> u64 {
    25_000
}

fn default_max_concurrency() -> usize {
    8
}

fn default_max_content_chars() -> usize {
    10_000
}

fn default_per_url_chars() -> usize {
    2_000
}

fn default_total_context_chars() -> usize {
    16_000
}

fn default_true() -> bool {
    true
}

fn default_sweep_interval_secs() -> u64 {
    3_600
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            context_sets_path: default_context_sets_path(),
            cache_backend: default_cache_backend(),
            db_path: default_db_path(),
            cache_ttl_days: default_cache_ttl_days(),
            failed_ttl_secs: default_failed_ttl_secs(),
            rate_limit_requests: default_rate_limit_requests(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            gather_deadline_ms: default_gather_deadline_ms(),
            max_concurrency: default_max_concurrency(),
            max_content_chars: default_max_content_chars(),
            per_url_chars: default_per_url_chars(),
            total_context_chars: default_total_context_chars(),
            respect_robots: true,
            block_private_hosts: true,
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl AppConfig {
    /// Per-fetch timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Outer deadline for a gather operation.
    pub fn gather_deadline(&self) -> Duration {
        Duration::from_millis(self.gather_deadline_ms)
    }

    /// Background sweep interval, `None` when disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    /// Cache TTLs derived from this configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the TTLs do not form a valid policy.
    pub fn cache_policy(&self) -> Result<CachePolicy, ConfigError> {
        let out_of_range = |field: &str| ConfigError::Invalid { field: field.into(), reason: "out of range".into() };
        let ttl = i64::try_from(self.cache_ttl_days)
            .ok()
            .and_then(chrono::Duration::try_days)
            .ok_or_else(|| out_of_range("cache_ttl_days"))?;
        let failed_ttl = i64::try_from(self.failed_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| out_of_range("failed_ttl_secs"))?;
        CachePolicy::new(ttl, failed_ttl)
            .map_err(|e| ConfigError::Invalid { field: "cache_ttl_days".into(), reason: e.to_string() })
    }

    /// Per-domain admission limits derived from this configuration.
    pub fn rate_limit(&self) -> RateLimit {
        RateLimit {
            limit: self.rate_limit_requests,
            window: chrono::Duration::seconds(self.rate_limit_window_secs.min(MAX_RATE_WINDOW_SECS) as i64),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `WEBCTX_`
    /// 2. TOML file from `WEBCTX_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("WEBCTX_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("WEBCTX_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
