//! Sliding-window rate limiting for secret retrieval
//!
//! Deters exfiltration-by-enumeration: every retrieval attempt counts
//! against a per-key window, and a key at its threshold is refused until
//! the window lapses. Refusal is always a soft failure.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    RateLimited,
}

/// Per-key attempt window, created lazily on first access
#[derive(Debug, Clone, Copy)]
struct AccessWindow {
    attempts: u32,
    window_start: Instant,
}

/// Per-key sliding-window attempt counter.
///
/// Window cardinality is bounded by the set of known secret keys, so
/// entries are never evicted.
#[derive(Debug)]
pub struct AccessLimiter {
    max_attempts: u32,
    window_duration: Duration,
    windows: HashMap<String, AccessWindow>,
}

impl AccessLimiter {
    pub fn new(max_attempts: u32, window_duration: Duration) -> Self {
        Self {
            max_attempts,
            window_duration,
            windows: HashMap::new(),
        }
    }

    /// Record a retrieval attempt for `key` and decide whether it may
    /// proceed. At the threshold the counter is not incremented further.
    pub fn check_and_record(&mut self, key: &str) -> AccessDecision {
        self.check_and_record_at(key, Instant::now())
    }

    /// Clock-explicit variant of [`check_and_record`](Self::check_and_record).
    pub(crate) fn check_and_record_at(&mut self, key: &str, now: Instant) -> AccessDecision {
        match self.windows.get_mut(key) {
            Some(window)
                if now.saturating_duration_since(window.window_start) <= self.window_duration =>
            {
                if window.attempts >= self.max_attempts {
                    return AccessDecision::RateLimited;
                }
                window.attempts += 1;
                AccessDecision::Allowed
            }
            _ => {
                self.windows.insert(
                    key.to_string(),
                    AccessWindow {
                        attempts: 1,
                        window_start: now,
                    },
                );
                AccessDecision::Allowed
            }
        }
    }
}
