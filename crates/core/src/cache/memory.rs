//! In-process cache backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::hash::cache_key;
use super::{CacheEntry, CachePolicy, CacheStats, CacheStore, EntryStatus};
use crate::Error;
use crate::clock::Clock;

/// Cache held in a map keyed by canonical-URL hash.
///
/// Reads take a shared lock and never mutate, so an expired entry stays in
/// the map (and in `stats`) until it is overwritten, removed or swept.
#[derive(Debug)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new(policy: CachePolicy, clock: Arc<dyn Clock>) -> Self {
        Self { entries: RwLock::new(HashMap::new()), policy, clock }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    fn insert(&self, entry: CacheEntry) -> CacheEntry {
        self.entries.write().insert(entry.key.clone(), entry.clone());
        entry
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, url: &str) -> Result<Option<CacheEntry>, Error> {
        let now = self.clock.now();
        let key = cache_key(url);
        let entries = self.entries.read();
        Ok(entries.get(&key).filter(|e| !e.is_expired_at(now)).cloned())
    }

    async fn put(&self, url: &str, content: &str) -> Result<CacheEntry, Error> {
        let entry = CacheEntry::fresh(url, content, self.clock.now(), &self.policy);
        Ok(self.insert(entry))
    }

    async fn put_failed(&self, url: &str, reason: &str) -> Result<CacheEntry, Error> {
        let entry = CacheEntry::failed(url, reason, self.clock.now(), &self.policy);
        Ok(self.insert(entry))
    }

    async fn remove(&self, urls: &[String]) -> Result<u64, Error> {
        let mut entries = self.entries.write();
        let removed = urls
            .iter()
            .filter(|url| entries.remove(&cache_key(url)).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn clear(&self) -> Result<u64, Error> {
        let mut entries = self.entries.write();
        let count = entries.len() as u64;
        entries.clear();
        Ok(count)
    }

    async fn purge_expired(&self) -> Result<u64, Error> {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired_at(now));
        Ok((before - entries.len()) as u64)
    }

    async fn stats(&self) -> Result<CacheStats, Error> {
        let now = self.clock.now();
        let entries = self.entries.read();

        let mut stats = CacheStats { entry_count: entries.len() as u64, ..Default::default() };
        for entry in entries.values() {
            stats.total_size_bytes += entry.size_bytes;
            stats.oldest_fetched_at = Some(stats.oldest_fetched_at.map_or(entry.fetched_at, |t| t.min(entry.fetched_at)));
            stats.newest_fetched_at = Some(stats.newest_fetched_at.map_or(entry.fetched_at, |t| t.max(entry.fetched_at)));
            match entry.status_at(now) {
                EntryStatus::Stale => stats.stale_count += 1,
                EntryStatus::Failed => stats.failed_count += 1,
                EntryStatus::Fresh => {}
            }
        }

        Ok(stats)
    }

    async fn ping(&self) -> Result<(), Error> {
        Ok(())
    }
}
