//! Core types and shared functionality for webctx.
//!
//! This crate provides:
//! - Tag extraction from chat text
//! - The context set registry with atomic reload
//! - Per-domain fixed-window rate limiting
//! - The web content cache (in-memory and SQLite backends)
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod registry;
pub mod tags;
pub mod text;
pub mod url;

pub use cache::{CacheDb, CacheEntry, CachePolicy, CacheStats, CacheStore, EntryStatus, MemoryCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, CacheBackend, ConfigError};
pub use error::{Error, ParseProblem};
pub use ratelimit::{DomainRateLimiter, RateLimit};
pub use registry::{ContextSet, Registry, RegistrySnapshot, RegistrySource, RegistryStatus};
pub use tags::extract_tags;
