//! Cache entry operations for the SQLite backend.
//!
//! Timestamps are stored as RFC 3339 strings with millisecond precision in
//! UTC, so lexical comparison in SQL matches chronological order.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, Row, types::Type};

use super::connection::CacheDb;
use super::hash::cache_key;
use super::{CacheEntry, CacheStats, CacheStore, EntryStatus};
use crate::Error;

const ENTRY_COLUMNS: &str = "key, url, content, status, fetched_at, expires_at, size_bytes, error";

fn to_sql_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_time(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<CacheEntry> {
    let status: String = row.get(3)?;
    let status = EntryStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(3, Type::Text, format!("unknown status {status}").into())
    })?;

    Ok(CacheEntry {
        key: row.get(0)?,
        url: row.get(1)?,
        content: row.get(2)?,
        status,
        fetched_at: parse_time(4, row.get(4)?)?,
        expires_at: parse_time(5, row.get(5)?)?,
        size_bytes: row.get::<_, i64>(6)? as u64,
        error: row.get(7)?,
    })
}

impl CacheDb {
    /// Insert or update an entry.
    ///
    /// Uses UPSERT semantics: inserts if the key doesn't exist,
    /// replaces all fields if it does.
    async fn upsert_entry(&self, entry: CacheEntry) -> Result<CacheEntry, Error> {
        self.conn
            .call(move |conn| -> Result<CacheEntry, Error> {
                conn.execute(
                    "INSERT INTO cache_entries (key, url, content, status, fetched_at, expires_at, size_bytes, error)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(key) DO UPDATE SET
                        url = excluded.url,
                        content = excluded.content,
                        status = excluded.status,
                        fetched_at = excluded.fetched_at,
                        expires_at = excluded.expires_at,
                        size_bytes = excluded.size_bytes,
                        error = excluded.error",
                    params![
                        &entry.key,
                        &entry.url,
                        &entry.content,
                        entry.status.as_str(),
                        to_sql_time(entry.fetched_at),
                        to_sql_time(entry.expires_at),
                        entry.size_bytes as i64,
                        &entry.error,
                    ],
                )?;
                Ok(entry)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl CacheStore for CacheDb {
    async fn get(&self, url: &str) -> Result<Option<CacheEntry>, Error> {
        let key = cache_key(url);
        let now = to_sql_time(self.clock.now());
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ENTRY_COLUMNS} FROM cache_entries WHERE key = ?1 AND expires_at > ?2"
                ))?;

                match stmt.query_row(params![key, now], entry_from_row) {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, url: &str, content: &str) -> Result<CacheEntry, Error> {
        let entry = CacheEntry::fresh(url, content, self.clock.now(), &self.policy);
        self.upsert_entry(entry).await
    }

    async fn put_failed(&self, url: &str, reason: &str) -> Result<CacheEntry, Error> {
        let entry = CacheEntry::failed(url, reason, self.clock.now(), &self.policy);
        self.upsert_entry(entry).await
    }

    async fn remove(&self, urls: &[String]) -> Result<u64, Error> {
        let keys: Vec<String> = urls.iter().map(|u| cache_key(u)).collect();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                let mut removed = 0u64;
                {
                    let mut stmt = tx.prepare("DELETE FROM cache_entries WHERE key = ?1")?;
                    for key in &keys {
                        removed += stmt.execute(params![key])? as u64;
                    }
                }
                tx.commit()?;
                Ok(removed)
            })
            .await
            .map_err(Error::from)
    }

    async fn clear(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cache_entries", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn purge_expired(&self) -> Result<u64, Error> {
        let now = to_sql_time(self.clock.now());
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cache_entries WHERE expires_at <= ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn stats(&self) -> Result<CacheStats, Error> {
        let now = to_sql_time(self.clock.now());
        self.conn
            .call(move |conn| -> Result<CacheStats, Error> {
                let stats = conn.query_row(
                    "SELECT
                        COUNT(*),
                        COALESCE(SUM(size_bytes), 0),
                        MIN(fetched_at),
                        MAX(fetched_at),
                        COALESCE(SUM(CASE WHEN expires_at <= ?1 THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN status = 'failed' AND expires_at > ?1 THEN 1 ELSE 0 END), 0)
                    FROM cache_entries",
                    params![now],
                    |row| {
                        let oldest: Option<String> = row.get(2)?;
                        let newest: Option<String> = row.get(3)?;
                        Ok(CacheStats {
                            entry_count: row.get::<_, i64>(0)? as u64,
                            total_size_bytes: row.get::<_, i64>(1)? as u64,
                            oldest_fetched_at: oldest.map(|t| parse_time(2, t)).transpose()?,
                            newest_fetched_at: newest.map(|t| parse_time(3, t)).transpose()?,
                            stale_count: row.get::<_, i64>(4)? as u64,
                            failed_count: row.get::<_, i64>(5)? as u64,
                        })
                    },
                )?;
                Ok(stats)
            })
            .await
            .map_err(Error::from)
    }

    async fn ping(&self) -> Result<(), Error> {
        self.conn
            .call(|conn| -> Result<(), Error> {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
