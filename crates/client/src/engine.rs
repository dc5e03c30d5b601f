//! The context engine: one object wiring registry, cache, rate limiter,
//! fetcher, orchestrator and assembler behind the chat-facing and admin
//! operations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use webctx_core::cache::{CacheDb, CacheStats, CacheStore, MemoryCache};
use webctx_core::tags::{extract_tags, strip_sigil};
use webctx_core::{
    AppConfig, CacheBackend, Clock, ContextSet, DomainRateLimiter, Error, Registry, RegistrySource, RegistryStatus,
    SystemClock,
};

use crate::assemble::{AssembleBudget, AssembledContext, assemble};
use crate::fetch::{FetchClient, FetchConfig, PageFetcher};
use crate::gather::{GatherOptions, GatherReport, GatherSettings, Gatherer};

/// Components of a [`ContextEngine`].
pub struct EngineParts {
    pub registry: Arc<Registry>,
    pub cache: Arc<dyn CacheStore>,
    pub limiter: Arc<DomainRateLimiter>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub settings: GatherSettings,
    pub budget: AssembleBudget,
    pub clock: Arc<dyn Clock>,
}

/// Result of clearing the cache for one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClearTagSummary {
    pub tag: String,
    /// Whether the registry knew the tag; unknown tags clear nothing.
    pub known: bool,
    pub url_count: usize,
    pub removed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SweepSummary {
    pub cache_entries_removed: u64,
    pub rate_windows_removed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub registry: RegistryStatus,
    pub cache_reachable: bool,
    pub cache_error: Option<String>,
    pub cache_entries: Option<u64>,
    pub cache_size_mb: Option<f64>,
    pub checked_at: DateTime<Utc>,
}

/// Retrieval engine for tagged web context.
pub struct ContextEngine {
    registry: Arc<Registry>,
    cache: Arc<dyn CacheStore>,
    limiter: Arc<DomainRateLimiter>,
    gatherer: Gatherer,
    budget: AssembleBudget,
    clock: Arc<dyn Clock>,
}

impl ContextEngine {
    pub fn new(parts: EngineParts) -> Self {
        let gatherer = Gatherer::new(
            parts.registry.clone(),
            parts.cache.clone(),
            parts.limiter.clone(),
            parts.fetcher,
            parts.settings,
        );
        Self {
            registry: parts.registry,
            cache: parts.cache,
            limiter: parts.limiter,
            gatherer,
            budget: parts.budget,
            clock: parts.clock,
        }
    }

    /// Build the engine described by `config`.
    ///
    /// A context set file that is missing or malformed leaves the registry
    /// empty (reported by [`ContextEngine::health`]); a cache that cannot be
    /// opened is an error.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let clock = SystemClock::shared();
        let policy = config.cache_policy().map_err(|e| Error::InvalidPolicy(e.to_string()))?;

        let cache: Arc<dyn CacheStore> = match config.cache_backend {
            CacheBackend::Memory => Arc::new(MemoryCache::new(policy, clock.clone())),
            CacheBackend::Sqlite => {
                tracing::info!(path = %config.db_path.display(), "opening cache database");
                Arc::new(CacheDb::open(&config.db_path).await?.with_policy(policy).with_clock(clock.clone()))
            }
        };

        let registry = Arc::new(Registry::load_or_empty(RegistrySource::File(config.context_sets_path.clone())));
        let limiter = Arc::new(DomainRateLimiter::new(config.rate_limit(), clock.clone()));
        let fetcher = Arc::new(FetchClient::new(FetchConfig::from(config))?);

        Ok(Self::new(EngineParts {
            registry,
            cache,
            limiter,
            fetcher,
            settings: GatherSettings::from(config),
            budget: AssembleBudget::from(config),
            clock,
        }))
    }

    /// Gather content for explicit tags and assemble it.
    pub async fn gather_context(&self, tags: &[String], options: GatherOptions) -> AssembledContext {
        let report = self.gather_report(tags, options).await;
        assemble(&report, self.budget)
    }

    /// Raw per-URL outcomes for `tags`.
    pub async fn gather_report(&self, tags: &[String], options: GatherOptions) -> GatherReport {
        self.gatherer.gather(tags, options).await
    }

    /// Extract the tags in a chat message and gather their context.
    pub async fn context_for_message(&self, message: &str, options: GatherOptions) -> AssembledContext {
        let tags = extract_tags(message);
        if tags.is_empty() {
            return AssembledContext::default();
        }
        self.gather_context(&tags, options).await
    }

    pub fn list_context_sets(&self) -> Vec<ContextSet> {
        self.registry.list_all()
    }

    /// Replace the context sets, from `source` or the configured file.
    ///
    /// On error the previous sets stay active.
    pub fn reload_context_sets(&self, source: Option<RegistrySource>) -> Result<Vec<ContextSet>, Error> {
        let snapshot = match source {
            Some(source) => self.registry.reload(&source)?,
            None => self.registry.reload_default()?,
        };
        Ok(snapshot.sets().cloned().collect())
    }

    pub async fn cache_stats(&self) -> Result<CacheStats, Error> {
        self.cache.stats().await
    }

    pub async fn clear_cache(&self) -> Result<u64, Error> {
        let removed = self.cache.clear().await?;
        tracing::info!(removed, "cache cleared");
        Ok(removed)
    }

    /// Remove the cached entries for every URL of `tag`.
    pub async fn clear_cache_for_tag(&self, tag: &str) -> Result<ClearTagSummary, Error> {
        let tag = strip_sigil(tag.trim()).to_string();
        let snapshot = self.registry.snapshot();
        let Some(set) = snapshot.get(&tag) else {
            return Ok(ClearTagSummary { tag, known: false, url_count: 0, removed: 0 });
        };

        let removed = self.cache.remove(&set.urls).await?;
        tracing::info!(tag = %tag, removed, "cache cleared for tag");
        Ok(ClearTagSummary { tag, known: true, url_count: set.urls.len(), removed })
    }

    /// Reclaim expired cache entries and elapsed rate windows.
    pub async fn sweep(&self) -> Result<SweepSummary, Error> {
        let cache_entries_removed = self.cache.purge_expired().await?;
        let rate_windows_removed = self.limiter.sweep();
        tracing::debug!(cache_entries_removed, rate_windows_removed, "sweep finished");
        Ok(SweepSummary { cache_entries_removed, rate_windows_removed })
    }

    /// Degraded when the cache does not answer or no context sets are loaded.
    pub async fn health(&self) -> HealthReport {
        let registry = self.registry.status();
        let probe = match self.cache.ping().await {
            Ok(()) => self.cache.stats().await,
            Err(e) => Err(e),
        };
        let (stats, cache_error) = match probe {
            Ok(stats) => (Some(stats), None),
            Err(e) => {
                tracing::warn!(error = %e, "cache health check failed");
                (None, Some(e.to_string()))
            }
        };
        let healthy = cache_error.is_none() && registry.loaded;

        HealthReport {
            status: if healthy { HealthStatus::Healthy } else { HealthStatus::Degraded },
            registry,
            cache_reachable: cache_error.is_none(),
            cache_error,
            cache_entries: stats.as_ref().map(|s| s.entry_count),
            cache_size_mb: stats.as_ref().map(|s| s.total_size_bytes as f64 / (1024.0 * 1024.0)),
            checked_at: self.clock.now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
