//! Fixed-window rate limiter for unlock attempts
//!
//! One record per client key. The check and the increment happen under the
//! map entry's shard lock, so concurrent attempts from the same key cannot
//! both read a stale count.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Window length
    pub window: Duration,
    /// Attempts allowed per window
    pub max_attempts: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_attempts: 10,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RateLimitRecord {
    count: u32,
    window_end: Instant,
}

/// Per-key attempt counter
#[derive(Debug)]
pub struct RateLimiter {
    records: DashMap<String, RateLimitRecord>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            records: DashMap::new(),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default())
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check if an attempt is allowed and record it
    pub fn check_and_record(&self, key: &str) -> bool {
        self.check_and_record_at(key, Instant::now())
    }

    /// As `check_and_record`, with an explicit clock
    pub fn check_and_record_at(&self, key: &str, now: Instant) -> bool {
        let fresh = RateLimitRecord {
            count: 1,
            window_end: now + self.config.window,
        };

        match self.records.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(fresh);
                true
            }
            Entry::Occupied(mut slot) => {
                let record = slot.get_mut();
                if now > record.window_end {
                    *record = fresh;
                    return true;
                }
                // A rejected attempt leaves the window untouched
                if record.count >= self.config.max_attempts {
                    return false;
                }
                record.count += 1;
                true
            }
        }
    }

    /// Drop records whose window has ended
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Instant::now())
    }

    pub fn cleanup_at(&self, now: Instant) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| now <= record.window_end);
        before - self.records.len()
    }

    /// Number of keys currently tracked
    pub fn tracked_keys(&self) -> usize {
        self.records.len()
    }
}

/// Periodically sweep expired records
pub fn spawn_cleanup_task(
    limiter: Arc<RateLimiter>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = limiter.cleanup();
            if removed > 0 {
                debug!(removed, "Rate limiter cleanup");
            }
        }
    })
}
