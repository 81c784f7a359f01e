//! Sliding window rate limiting.
//!
//! One limiter type serves both bot command throttling (keyed by user id)
//! and dashboard login throttling (keyed by client IP).

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Rate limiter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum admissions per window.
    pub max_requests: u32,
    /// Trailing window duration.
    pub window: Duration,
    /// Whether rate limiting is enabled.
    pub enabled: bool,
    /// Maximum number of tracked keys (memory limit).
    pub max_tracked_keys: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::commands()
    }
}

impl RateLimitConfig {
    /// Bot command throttling: 30 commands per minute.
    pub fn commands() -> Self {
        Self::custom(30, 60)
    }

    /// Dashboard login throttling: 5 attempts per 15 minutes.
    pub fn login() -> Self {
        Self::custom(5, 900)
    }

    /// Create a disabled rate limiter config.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::commands()
        }
    }

    /// Custom rate limit.
    pub fn custom(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
            enabled: true,
            max_tracked_keys: 10_000,
        }
    }
}

/// Admission history for one key.
#[derive(Debug, Clone, Default)]
struct RateWindow {
    /// Instants of admitted calls, oldest first.
    timestamps: Vec<Instant>,
}

impl RateWindow {
    /// Drop admissions at or before the cutoff and return the current count.
    fn prune(&mut self, now: Instant, window: Duration) -> u32 {
        if let Some(cutoff) = now.checked_sub(window) {
            self.timestamps.retain(|&t| t > cutoff);
        }
        self.timestamps.len() as u32
    }

    fn last(&self) -> Option<Instant> {
        self.timestamps.last().copied()
    }
}

/// Thread-safe per-key sliding window limiter.
///
/// A call is admitted iff fewer than `max_requests` calls were admitted for
/// the same key within `(now - window, now]`. Rejected calls are not
/// recorded, so a throttled caller cannot extend its own lockout.
#[derive(Debug)]
pub struct SlidingWindowLimiter<K> {
    records: RwLock<HashMap<K, RateWindow>>,
    config: RateLimitConfig,
    last_cleanup: RwLock<Instant>,
}

impl<K> SlidingWindowLimiter<K>
where
    K: Eq + Hash + Clone,
{
    /// Create a new limiter.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            config,
            last_cleanup: RwLock::new(Instant::now()),
        }
    }

    /// Create a limiter that admits everything.
    pub fn disabled() -> Self {
        Self::new(RateLimitConfig::disabled())
    }

    /// Check if rate limiting is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Limiter configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admit or reject a call for `key` now.
    pub fn allow(&self, key: &K) -> bool {
        self.check(key).is_ok()
    }

    /// Admit or reject a call for `key` at the given instant.
    pub fn allow_at(&self, key: &K, now: Instant) -> bool {
        self.check_at(key, now).is_ok()
    }

    /// Check if a call for `key` should be admitted now.
    ///
    /// Returns `Ok(remaining)` if admitted, `Err(retry_after)` if rate limited.
    pub fn check(&self, key: &K) -> Result<u32, Duration> {
        self.check_at(key, Instant::now())
    }

    /// Check if a call for `key` should be admitted at the given instant.
    pub fn check_at(&self, key: &K, now: Instant) -> Result<u32, Duration> {
        if !self.config.enabled {
            return Ok(self.config.max_requests);
        }

        self.maybe_cleanup(now);

        // A poisoned map still holds consistent windows; keep enforcing them.
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);

        if !records.contains_key(key) && records.len() >= self.config.max_tracked_keys {
            let keep = self.config.max_tracked_keys.saturating_sub(1);
            self.evict_locked(&mut records, now, keep);
        }

        let record = records.entry(key.clone()).or_default();
        let current_count = record.prune(now, self.config.window);

        if current_count >= self.config.max_requests {
            let retry_after = record
                .timestamps
                .first()
                .map(|&oldest| (oldest + self.config.window).saturating_duration_since(now))
                .unwrap_or(self.config.window);
            return Err(retry_after);
        }

        record.timestamps.push(now);
        Ok(self.config.max_requests - current_count - 1)
    }

    /// Forget all admissions recorded for `key`.
    pub fn reset(&self, key: &K) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.remove(key);
    }

    /// Evict idle keys if a window has passed since the last sweep.
    fn maybe_cleanup(&self, now: Instant) {
        let due = self
            .last_cleanup
            .read()
            .map(|t| now.saturating_duration_since(*t) > self.config.window)
            .unwrap_or(false);

        if !due {
            return;
        }

        if let Ok(mut last) = self.last_cleanup.write() {
            // Double-check after acquiring lock
            if now.saturating_duration_since(*last) <= self.config.window {
                return;
            }
            *last = now;
            drop(last);
            self.evict_idle_at(now);
        }
    }

    /// Remove keys with no admissions inside the window, then enforce the
    /// tracked-key cap by dropping the least recently active keys.
    ///
    /// Returns the number of keys removed.
    pub fn evict_idle_at(&self, now: Instant) -> usize {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        self.evict_locked(&mut records, now, self.config.max_tracked_keys)
    }

    fn evict_locked(&self, records: &mut HashMap<K, RateWindow>, now: Instant, keep: usize) -> usize {
        let before = records.len();

        match now.checked_sub(self.config.window) {
            Some(cutoff) => records.retain(|_, record| record.last().is_some_and(|t| t > cutoff)),
            None => records.retain(|_, record| record.last().is_some()),
        }

        if records.len() > keep {
            let mut entries: Vec<_> = records
                .iter()
                .map(|(key, record)| (key.clone(), record.last()))
                .collect();
            entries.sort_by_key(|(_, t)| *t);

            let to_remove = records.len() - keep;
            for (key, _) in entries.into_iter().take(to_remove) {
                records.remove(&key);
            }
        }

        before - records.len()
    }

    /// Get current stats.
    pub fn stats(&self) -> RateLimitStats {
        let tracked_keys = self
            .records
            .read()
            .map(|r| r.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len());
        RateLimitStats {
            tracked_keys,
            max_requests: self.config.max_requests,
            window_secs: self.config.window.as_secs(),
            enabled: self.config.enabled,
        }
    }
}

impl<K> Default for SlidingWindowLimiter<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

/// Rate limit statistics.
#[derive(Debug, Clone)]
pub struct RateLimitStats {
    pub tracked_keys: usize,
    pub max_requests: u32,
    pub window_secs: u64,
    pub enabled: bool,
}
