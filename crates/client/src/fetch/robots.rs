//! robots.txt compliance with caching.
//!
//! Fetches and caches robots.txt files per origin, respecting a 24-hour TTL.

use robotstxt_rs::RobotsTxt;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use url::Url;

/// TTL for cached robots.txt documents (24 hours).
const ROBOTS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Maximum size of robots.txt to fetch (1MB).
const MAX_ROBOTS_SIZE: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum RobotsError {
    #[error("robots.txt disallowed: {path} (robots_url: {robots_url})")]
    Disallowed { path: String, robots_url: String },

    #[error("failed to fetch robots.txt: {0}")]
    FetchError(String),

    #[error("robots.txt too large")]
    TooLarge,
}

struct CachedRobots {
    robots: RobotsTxt,
    fetched_at: Instant,
}

impl CachedRobots {
    fn is_expired(&self) -> bool {
        self.fetched_at.elapsed() > ROBOTS_TTL
    }
}

/// In-memory cache of robots.txt documents keyed by robots URL.
pub struct RobotsCache {
    cache: RwLock<HashMap<String, CachedRobots>>,
    user_agent: String,
    http: reqwest::Client,
}

impl RobotsCache {
    /// Create a cache that fetches through `http`.
    pub fn new(user_agent: String, http: reqwest::Client) -> Self {
        Self { cache: RwLock::new(HashMap::new()), user_agent, http }
    }

    /// Require that robots.txt allows fetching `url`.
    ///
    /// Fetches and caches robots.txt for the origin on first use. A missing
    /// robots.txt (4xx) allows everything.
    pub async fn check(&self, url: &Url) -> Result<(), RobotsError> {
        let robots_url = robots_url(url);

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&robots_url)
                && !cached.is_expired()
            {
                tracing::debug!(robots_url = %robots_url, "robots.txt cache hit");
                return self.evaluate(&cached.robots, url, &robots_url);
            }
        }

        let robots = self.fetch_robots(&robots_url).await?;
        let verdict = self.evaluate(&robots, url, &robots_url);

        let mut cache = self.cache.write().await;
        cache.insert(robots_url, CachedRobots { robots, fetched_at: Instant::now() });

        verdict
    }

    fn evaluate(&self, robots: &RobotsTxt, url: &Url, robots_url: &str) -> Result<(), RobotsError> {
        if robots.can_fetch(&self.user_agent, url.as_str()) {
            Ok(())
        } else {
            Err(RobotsError::Disallowed { path: url.path().to_string(), robots_url: robots_url.to_string() })
        }
    }

    async fn fetch_robots(&self, url: &str) -> Result<RobotsTxt, RobotsError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| RobotsError::FetchError(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            if let Some(len) = response.content_length()
                && len as usize > MAX_ROBOTS_SIZE
            {
                return Err(RobotsError::TooLarge);
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| RobotsError::FetchError(e.to_string()))?;

            if bytes.len() > MAX_ROBOTS_SIZE {
                return Err(RobotsError::TooLarge);
            }

            Ok(RobotsTxt::parse(&String::from_utf8_lossy(&bytes)))
        } else if status.is_client_error() {
            tracing::debug!("robots.txt not found for {}, allowing all", url);
            Ok(RobotsTxt::parse(""))
        } else {
            Err(RobotsError::FetchError(format!("status {}", status)))
        }
    }

    /// Drop expired documents. Returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut cache = self.cache.write().await;
        let before = cache.len();
        cache.retain(|_, cached| !cached.is_expired());
        before - cache.len()
    }
}

fn robots_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or("");
    match url.port() {
        Some(port) => format!("{}://{}:{}/robots.txt", url.scheme(), host, port),
        None => format!("{}://{}/robots.txt", url.scheme(), host),
    }
}
