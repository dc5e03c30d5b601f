//! Fetch orchestration for one gather call.
//!
//! A call resolves its tags against a single registry snapshot and walks the
//! unique URLs in request order. Phase one is sequential: a cache lookup,
//! then domain admission for misses, so the rate limiter sees URLs in a
//! deterministic order. Phase two fetches the admitted URLs concurrently,
//! bounded by a semaphore, each under its own timeout. The outer deadline
//! starts when the call does and covers both phases and the cache writes.
//! Any URL not settled by then is reported as [`FetchOutcome::Abandoned`].
//! No per-URL failure fails the call.

mod outcome;

pub use outcome::{FetchOutcome, GatherReport, TagResult, UrlResult};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use webctx_core::cache::{CacheStore, EntryStatus};
use webctx_core::tags::strip_sigil;
use webctx_core::url::domain_of;
use webctx_core::{AppConfig, DomainRateLimiter, Registry};

use crate::fetch::{FetchFailure, PageFetcher};

/// Limits applied to the network phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatherSettings {
    pub fetch_timeout: Duration,
    /// Upper bound on the whole gather call.
    pub deadline: Duration,
    pub max_concurrency: usize,
}

impl Default for GatherSettings {
    fn default() -> Self {
        Self { fetch_timeout: Duration::from_secs(10), deadline: Duration::from_secs(25), max_concurrency: 8 }
    }
}

impl From<&AppConfig> for GatherSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            fetch_timeout: config.timeout(),
            deadline: config.gather_deadline(),
            max_concurrency: config.max_concurrency,
        }
    }
}

/// Per-call switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatherOptions {
    /// Skip cache reads (including failure markers). Rate limits still apply.
    pub force_refresh: bool,
}

enum Admission {
    Resolved(FetchOutcome),
    Fetch,
}

/// Orchestrates cache, rate limiter and fetcher for a set of tags.
pub struct Gatherer {
    registry: Arc<Registry>,
    cache: Arc<dyn CacheStore>,
    limiter: Arc<DomainRateLimiter>,
    fetcher: Arc<dyn PageFetcher>,
    settings: GatherSettings,
}

impl Gatherer {
    pub fn new(
        registry: Arc<Registry>, cache: Arc<dyn CacheStore>, limiter: Arc<DomainRateLimiter>,
        fetcher: Arc<dyn PageFetcher>, settings: GatherSettings,
    ) -> Self {
        Self { registry, cache, limiter, fetcher, settings }
    }

    pub fn settings(&self) -> GatherSettings {
        self.settings
    }

    /// Gather content for `tags` (with or without `@`).
    ///
    /// Duplicate tags collapse to their first occurrence and a URL shared by
    /// several tags is looked up and fetched once.
    pub async fn gather(&self, tags: &[String], options: GatherOptions) -> GatherReport {
        let deadline = Instant::now() + self.settings.deadline;
        let snapshot = self.registry.snapshot();

        let mut seen_tags = HashSet::new();
        let tags: Vec<String> = tags
            .iter()
            .map(|t| strip_sigil(t.trim()).to_string())
            .filter(|t| !t.is_empty() && seen_tags.insert(t.clone()))
            .collect();

        let mut seen_urls = HashSet::new();
        let mut urls = Vec::new();
        for tag in &tags {
            match snapshot.get(tag) {
                Some(set) => {
                    for url in &set.urls {
                        if seen_urls.insert(url.as_str()) {
                            urls.push(url.clone());
                        }
                    }
                }
                None => tracing::debug!(tag = %tag, "unknown context set"),
            }
        }

        let mut outcomes = HashMap::with_capacity(urls.len());
        let mut admitted = Vec::new();
        for url in urls {
            match tokio::time::timeout_at(deadline, self.admit(&url, options)).await {
                Ok(Admission::Resolved(outcome)) => {
                    outcomes.insert(url, outcome);
                }
                Ok(Admission::Fetch) => admitted.push(url),
                Err(_) => {
                    tracing::warn!(url, "gather deadline reached during cache lookup");
                    break;
                }
            }
        }

        self.fetch_admitted(admitted, deadline, &mut outcomes).await;

        let tags = tags
            .into_iter()
            .map(|tag| match snapshot.get(&tag) {
                Some(set) => TagResult {
                    known: true,
                    name: set.name.clone(),
                    results: set
                        .urls
                        .iter()
                        .map(|url| UrlResult {
                            url: url.clone(),
                            outcome: outcomes.get(url).cloned().unwrap_or(FetchOutcome::Abandoned),
                        })
                        .collect(),
                    tag,
                },
                None => TagResult { tag, known: false, name: None, results: Vec::new() },
            })
            .collect();

        GatherReport { tags }
    }

    async fn admit(&self, url: &str, options: GatherOptions) -> Admission {
        if !options.force_refresh {
            match self.cache.get(url).await {
                Ok(Some(entry)) if entry.status == EntryStatus::Failed => {
                    let reason = entry.error.unwrap_or_else(|| "previous fetch failed".into());
                    return Admission::Resolved(FetchOutcome::RecentlyFailed { reason });
                }
                Ok(Some(entry)) => {
                    tracing::debug!(url, "cache hit");
                    return Admission::Resolved(FetchOutcome::Served { content: entry.content, from_cache: true });
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(url, error = %e, "cache read failed; treating as miss"),
            }
        }

        let Some(domain) = domain_of(url) else {
            return Admission::Resolved(FetchOutcome::NetworkError { reason: format!("invalid URL: {url}") });
        };

        if self.limiter.try_acquire(&domain) {
            Admission::Fetch
        } else {
            tracing::info!(url, domain = %domain, "fetch skipped: domain rate limited");
            Admission::Resolved(FetchOutcome::RateLimited)
        }
    }

    async fn fetch_admitted(&self, urls: Vec<String>, deadline: Instant, outcomes: &mut HashMap<String, FetchOutcome>) {
        if urls.is_empty() {
            return;
        }

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let fetch_timeout = self.settings.fetch_timeout;
        let mut tasks = JoinSet::new();

        for url in urls {
            let semaphore = semaphore.clone();
            let fetcher = self.fetcher.clone();
            tasks.spawn(async move {
                // NOTE: held until the fetch finishes
                let _permit = semaphore.acquire_owned().await;
                let result = match tokio::time::timeout(fetch_timeout, fetcher.fetch_text(&url)).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchFailure::Timeout),
                };
                (url, result)
            });
        }

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((url, result)))) => {
                    let outcome = outcome_of(&url, &result);
                    let written = tokio::time::timeout_at(deadline, self.record(&url, &result)).await;
                    outcomes.insert(url, outcome);
                    if written.is_err() {
                        tracing::warn!(pending = tasks.len(), "gather deadline reached during cache write");
                        tasks.abort_all();
                        break;
                    }
                }
                Ok(Some(Err(e))) => tracing::warn!(error = %e, "fetch task failed"),
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(pending = tasks.len(), "gather deadline reached; abandoning in-flight fetches");
                    tasks.abort_all();
                    break;
                }
            }
        }
    }

    /// Write a fetch result back to the cache.
    async fn record(&self, url: &str, result: &Result<String, FetchFailure>) {
        match result {
            Ok(content) => {
                if let Err(e) = self.cache.put(url, content).await {
                    tracing::warn!(url, error = %e, "failed to cache fetched content");
                }
            }
            Err(failure) => {
                if let Err(e) = self.cache.put_failed(url, &failure.to_string()).await {
                    tracing::warn!(url, error = %e, "failed to record fetch failure");
                }
            }
        }
    }
}

fn outcome_of(url: &str, result: &Result<String, FetchFailure>) -> FetchOutcome {
    match result {
        Ok(content) => {
            tracing::info!(url, chars = content.chars().count(), "fetched context page");
            FetchOutcome::Served { content: content.clone(), from_cache: false }
        }
        Err(failure) => {
            tracing::warn!(url, error = %failure, "context fetch failed");
            match failure {
                FetchFailure::Timeout => FetchOutcome::Timeout,
                FetchFailure::Network(reason) => FetchOutcome::NetworkError { reason: reason.clone() },
            }
        }
    }
}
