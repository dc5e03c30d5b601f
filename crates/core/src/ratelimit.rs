//! Per-domain fixed-window admission control.
//!
//! Each domain gets a counter that admits up to `limit` fetches per window.
//! Once the window has elapsed the counter starts over with the next request.
//! Denied requests are not queued: the caller skips the fetch.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::clock::Clock;

/// Admission limits applied to every domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum admitted fetches per window (default: 10).
    pub limit: u32,
    /// Window length (default: 60s).
    pub window: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self { limit: 10, window: Duration::seconds(60) }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start: DateTime<Utc>,
    count: u32,
}

impl Window {
    fn is_elapsed(&self, now: DateTime<Utc>, length: Duration) -> bool {
        now - self.start >= length
    }
}

/// Fixed-window rate limiter keyed by domain.
///
/// `try_acquire` runs under a single lock, so concurrent callers targeting
/// the same domain never over-admit.
#[derive(Debug)]
pub struct DomainRateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    limits: RateLimit,
    clock: Arc<dyn Clock>,
}

impl DomainRateLimiter {
    pub fn new(limits: RateLimit, clock: Arc<dyn Clock>) -> Self {
        Self { windows: Mutex::new(HashMap::new()), limits, clock }
    }

    pub fn limits(&self) -> RateLimit {
        self.limits
    }

    /// Request admission for one fetch against `domain`.
    ///
    /// Returns `true` and counts the request when the domain is under its
    /// limit for the current window.
    pub fn try_acquire(&self, domain: &str) -> bool {
        let now = self.clock.now();
        let mut windows = self.windows.lock();

        let window = windows
            .entry(domain.to_string())
            .or_insert(Window { start: now, count: 0 });

        if window.is_elapsed(now, self.limits.window) {
            *window = Window { start: now, count: 0 };
        }

        if window.count >= self.limits.limit {
            tracing::debug!(domain, count = window.count, "rate limit reached");
            return false;
        }

        window.count += 1;
        true
    }

    /// Requests counted against `domain` in its current window.
    pub fn usage(&self, domain: &str) -> u32 {
        let now = self.clock.now();
        self.windows
            .lock()
            .get(domain)
            .filter(|w| !w.is_elapsed(now, self.limits.window))
            .map_or(0, |w| w.count)
    }

    /// Drop windows that have elapsed. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let length = self.limits.window;
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, w| !w.is_elapsed(now, length));
        before - windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(limit: u32) -> (DomainRateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let limiter = DomainRateLimiter::new(RateLimit { limit, window: Duration::seconds(60) }, clock.clone());
        (limiter, clock)
    }

    #[test]
    fn test_eleventh_request_denied() {
        let (limiter, _clock) = limiter(10);
        for _ in 0..10 {
            assert!(limiter.try_acquire("example.com"));
        }
        assert!(!limiter.try_acquire("example.com"));
        assert_eq!(limiter.usage("example.com"), 10);
    }

    #[test]
    fn test_window_reset_grants_again() {
        let (limiter, clock) = limiter(10);
        for _ in 0..10 {
            limiter.try_acquire("example.com");
        }
        assert!(!limiter.try_acquire("example.com"));

        clock.advance(Duration::seconds(59));
        assert!(!limiter.try_acquire("example.com"));

        clock.advance(Duration::seconds(1));
        assert!(limiter.try_acquire("example.com"));
        assert_eq!(limiter.usage("example.com"), 1);
    }

    #[test]
    fn test_domains_are_independent() {
        let (limiter, _clock) = limiter(1);
        assert!(limiter.try_acquire("a.example"));
        assert!(!limiter.try_acquire("a.example"));
        assert!(limiter.try_acquire("b.example"));
    }

    #[test]
    fn test_denied_requests_do_not_count() {
        let (limiter, _clock) = limiter(2);
        for _ in 0..5 {
            limiter.try_acquire("example.com");
        }
        assert_eq!(limiter.usage("example.com"), 2);
    }

    #[test]
    fn test_sweep_removes_elapsed_windows() {
        let (limiter, clock) = limiter(10);
        limiter.try_acquire("a.example");
        clock.advance(Duration::seconds(30));
        limiter.try_acquire("b.example");
        clock.advance(Duration::seconds(31));

        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.usage("a.example"), 0);
        assert_eq!(limiter.usage("b.example"), 1);
    }

    #[test]
    fn test_concurrent_acquire_never_over_admits() {
        let (limiter, _clock) = limiter(10);
        let limiter = Arc::new(limiter);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || (0..5).filter(|_| limiter.try_acquire("example.com")).count())
            })
            .collect();

        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 10);
    }
}
