//! Cache of fetched web content with TTL-based expiry.
//!
//! Entries are keyed by the SHA-256 of the canonical URL. Two backends
//! implement [`CacheStore`]:
//!
//! - [`MemoryCache`]: process-local map behind a lock
//! - [`CacheDb`]: SQLite via tokio-rusqlite, with schema migrations and WAL mode
//!
//! Eviction is lazy. An expired entry is a miss on read and is physically
//! reclaimed by the next write to the same key or by [`CacheStore::purge_expired`].

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use memory::MemoryCache;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Fetched content within its TTL.
    Fresh,
    /// Past its expiry and awaiting reclamation; never returned by `get`.
    Stale,
    /// Short-lived marker for a URL whose last fetch failed.
    Failed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Fresh => "fresh",
            EntryStatus::Stale => "stale",
            EntryStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fresh" => Some(EntryStatus::Fresh),
            "stale" => Some(EntryStatus::Stale),
            "failed" => Some(EntryStatus::Failed),
            _ => None,
        }
    }
}

/// A cached page or failure marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CacheEntry {
    pub key: String,
    pub url: String,
    /// Extracted text; empty for failure markers.
    pub content: String,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: EntryStatus,
    pub size_bytes: u64,
    /// Why the last fetch failed (failure markers only).
    pub error: Option<String>,
}

impl CacheEntry {
    /// A fresh entry for successfully fetched content.
    pub fn fresh(url: &str, content: &str, now: DateTime<Utc>, policy: &CachePolicy) -> Self {
        Self {
            key: hash::cache_key(url),
            url: url.to_string(),
            content: content.to_string(),
            fetched_at: now,
            expires_at: expiry(now, policy.ttl()),
            status: EntryStatus::Fresh,
            size_bytes: content.len() as u64,
            error: None,
        }
    }

    /// A failure marker living for the policy's shorter failed TTL.
    pub fn failed(url: &str, reason: &str, now: DateTime<Utc>, policy: &CachePolicy) -> Self {
        Self {
            key: hash::cache_key(url),
            url: url.to_string(),
            content: String::new(),
            fetched_at: now,
            expires_at: expiry(now, policy.failed_ttl()),
            status: EntryStatus::Failed,
            size_bytes: 0,
            error: Some(reason.to_string()),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Status as observed at `now`: any entry past expiry reads as stale.
    pub fn status_at(&self, now: DateTime<Utc>) -> EntryStatus {
        if self.is_expired_at(now) { EntryStatus::Stale } else { self.status }
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Longest TTL a policy accepts.
const MAX_TTL_DAYS: i64 = 36_500;

/// TTLs applied by a cache store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    ttl: Duration,
    failed_ttl: Duration,
}

impl CachePolicy {
    /// Build a policy; both TTLs must be positive and the failure TTL shorter.
    /// TTLs beyond a century are rejected so expiry timestamps stay representable.
    pub fn new(ttl: Duration, failed_ttl: Duration) -> Result<Self, Error> {
        if ttl <= Duration::zero() {
            return Err(Error::InvalidPolicy("ttl must be positive".into()));
        }
        if ttl > Duration::days(MAX_TTL_DAYS) {
            return Err(Error::InvalidPolicy(format!("ttl must not exceed {MAX_TTL_DAYS} days")));
        }
        if failed_ttl <= Duration::zero() {
            return Err(Error::InvalidPolicy("failed ttl must be positive".into()));
        }
        if failed_ttl >= ttl {
            return Err(Error::InvalidPolicy("failed ttl must be shorter than ttl".into()));
        }
        Ok(Self { ttl, failed_ttl })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn failed_ttl(&self) -> Duration {
        self.failed_ttl
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self { ttl: Duration::days(14), failed_ttl: Duration::hours(1) }
    }
}

/// Aggregate numbers for the admin `cache_stats` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CacheStats {
    /// Physically present entries, including stale ones not yet reclaimed.
    pub entry_count: u64,
    pub total_size_bytes: u64,
    pub oldest_fetched_at: Option<DateTime<Utc>>,
    pub newest_fetched_at: Option<DateTime<Utc>>,
    pub stale_count: u64,
    pub failed_count: u64,
}

impl CacheStats {
    /// Age in hours of the oldest and newest entries at `now`.
    pub fn age_hours(&self, now: DateTime<Utc>) -> (Option<f64>, Option<f64>) {
        let hours = |t: DateTime<Utc>| (now - t).num_seconds() as f64 / 3_600.0;
        (self.oldest_fetched_at.map(hours), self.newest_fetched_at.map(hours))
    }
}

/// Keyed store of fetched content.
///
/// Every operation is linearizable per key: a `put` fully replaces the prior
/// entry for the same canonical URL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// The live entry for `url` (fresh content or a failure marker), or `None`
    /// when absent or expired.
    async fn get(&self, url: &str) -> Result<Option<CacheEntry>, Error>;

    /// Store fetched content as a fresh entry.
    async fn put(&self, url: &str, content: &str) -> Result<CacheEntry, Error>;

    /// Record a short-lived failure marker.
    async fn put_failed(&self, url: &str, reason: &str) -> Result<CacheEntry, Error>;

    /// Remove the entries for `urls`. Returns the number removed.
    async fn remove(&self, urls: &[String]) -> Result<u64, Error>;

    /// Remove every entry. Returns the number removed.
    async fn clear(&self) -> Result<u64, Error>;

    /// Physically reclaim expired entries. Returns the number removed.
    async fn purge_expired(&self) -> Result<u64, Error>;

    async fn stats(&self) -> Result<CacheStats, Error>;

    /// Check that the backing store answers.
    async fn ping(&self) -> Result<(), Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_rejects_non_positive() {
        assert!(CachePolicy::new(Duration::zero(), Duration::hours(1)).is_err());
        assert!(CachePolicy::new(Duration::days(-1), Duration::hours(1)).is_err());
        assert!(CachePolicy::new(Duration::days(14), Duration::zero()).is_err());
        assert!(CachePolicy::new(Duration::hours(1), Duration::hours(2)).is_err());
    }

    #[test]
    fn test_policy_rejects_unbounded_ttl() {
        assert!(CachePolicy::new(Duration::days(100_000_000), Duration::hours(1)).is_err());
        assert!(CachePolicy::new(Duration::days(MAX_TTL_DAYS), Duration::hours(1)).is_ok());
    }

    #[test]
    fn test_entry_expiry_saturates_near_max_timestamp() {
        let policy = CachePolicy::new(Duration::days(MAX_TTL_DAYS), Duration::hours(1)).unwrap();
        let now = DateTime::<Utc>::MAX_UTC - Duration::days(1);
        let entry = CacheEntry::fresh("https://example.com/", "Speisekarte", now, &policy);

        assert_eq!(entry.expires_at, DateTime::<Utc>::MAX_UTC);
        assert_eq!(entry.status_at(now), EntryStatus::Fresh);
    }

    #[test]
    fn test_entry_expiry_after_fetch() {
        let now = Utc::now();
        let policy = CachePolicy::default();
        let entry = CacheEntry::fresh("https://example.com/", "Speisekarte", now, &policy);

        assert!(entry.expires_at > entry.fetched_at);
        assert_eq!(entry.expires_at - entry.fetched_at, Duration::days(14));
        assert_eq!(entry.size_bytes, "Speisekarte".len() as u64);
        assert_eq!(entry.status_at(now), EntryStatus::Fresh);
        assert_eq!(entry.status_at(now + Duration::days(14)), EntryStatus::Stale);
    }

    #[test]
    fn test_failed_entry_shorter_ttl() {
        let now = Utc::now();
        let policy = CachePolicy::default();
        let entry = CacheEntry::failed("https://example.com/", "timeout", now, &policy);

        assert_eq!(entry.status, EntryStatus::Failed);
        assert_eq!(entry.expires_at - now, Duration::hours(1));
        assert_eq!(entry.error.as_deref(), Some("timeout"));
        assert_eq!(entry.status_at(now + Duration::minutes(59)), EntryStatus::Failed);
        assert_eq!(entry.status_at(now + Duration::days(1)), EntryStatus::Stale);
    }

    #[test]
    fn test_status_round_trip_names() {
        for status in [EntryStatus::Fresh, EntryStatus::Stale, EntryStatus::Failed] {
            assert_eq!(EntryStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(EntryStatus::parse("unknown"), None);
    }

    #[test]
    fn test_stats_age_hours() {
        let now = Utc::now();
        let stats = CacheStats {
            entry_count: 2,
            oldest_fetched_at: Some(now - Duration::hours(48)),
            newest_fetched_at: Some(now - Duration::minutes(30)),
            ..Default::default()
        };
        let (oldest, newest) = stats.age_hours(now);
        assert_eq!(oldest, Some(48.0));
        assert_eq!(newest, Some(0.5));
    }
}
