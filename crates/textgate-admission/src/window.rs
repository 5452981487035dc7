//! Per-identity sliding-window rate state.
//!
//! This is the only cross-request mutable state in the pipeline. Windows
//! live in a `DashMap` keyed by identity; `DashMap::entry` holds the shard
//! lock for the duration of a check-and-record, so concurrent requests from
//! the same identity can never under- or over-count. Idle identities are
//! evicted after a TTL.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Length of the sliding window.
const WINDOW: Duration = Duration::from_secs(60);

/// Which per-minute limit a request exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateExceeded {
    /// Too many requests in the window.
    Requests { observed: u32, limit: u32 },
    /// Too many estimated tokens in the window.
    Tokens { observed: u64, limit: u64 },
}

#[derive(Debug, Default)]
struct IdentityWindow {
    /// Timestamps of admitted requests inside the window.
    requests: VecDeque<Instant>,
    /// (timestamp, estimated tokens) of admitted requests inside the window.
    tokens: VecDeque<(Instant, u64)>,
    last_seen: Option<Instant>,
}

impl IdentityWindow {
    fn prune(&mut self, now: Instant) {
        let cutoff = now.checked_sub(WINDOW);
        let Some(cutoff) = cutoff else { return };
        while self.requests.front().is_some_and(|&t| t <= cutoff) {
            self.requests.pop_front();
        }
        while self.tokens.front().is_some_and(|&(t, _)| t <= cutoff) {
            self.tokens.pop_front();
        }
    }
}

/// Sliding-window request/token counters, one window per identity.
#[derive(Debug, Default)]
pub struct RateWindows {
    windows: DashMap<String, IdentityWindow>,
}

impl RateWindows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the identity against both per-minute limits and, if within
    /// them, record this request atomically.
    ///
    /// `None` for a limit means unbounded; a rejected request is not
    /// recorded, so probing while limited does not extend the limit.
    pub fn check_and_record(
        &self,
        identity: &str,
        estimated_tokens: u64,
        requests_per_minute: Option<u32>,
        tokens_per_minute: Option<u64>,
    ) -> Result<(), RateExceeded> {
        self.check_and_record_at(
            identity,
            estimated_tokens,
            requests_per_minute,
            tokens_per_minute,
            Instant::now(),
        )
    }

    /// Like [`check_and_record`](Self::check_and_record) with an explicit
    /// clock, so tests can drive the window deterministically.
    pub fn check_and_record_at(
        &self,
        identity: &str,
        estimated_tokens: u64,
        requests_per_minute: Option<u32>,
        tokens_per_minute: Option<u64>,
        now: Instant,
    ) -> Result<(), RateExceeded> {
        let mut entry = self.windows.entry(identity.to_string()).or_default();
        entry.prune(now);
        entry.last_seen = Some(now);

        if let Some(limit) = requests_per_minute {
            let observed = entry.requests.len() as u32;
            if observed >= limit {
                return Err(RateExceeded::Requests { observed, limit });
            }
        }
        if let Some(limit) = tokens_per_minute {
            let observed: u64 = entry.tokens.iter().map(|&(_, t)| t).sum();
            if observed + estimated_tokens > limit {
                return Err(RateExceeded::Tokens {
                    observed: observed + estimated_tokens,
                    limit,
                });
            }
        }

        entry.requests.push_back(now);
        entry.tokens.push_back((now, estimated_tokens));
        Ok(())
    }

    /// Drop identities not seen within `ttl`. Returns how many were evicted.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, w| w.last_seen.is_some_and(|t| now.duration_since(t) < ttl));
        before - self.windows.len()
    }

    /// Number of identities currently tracked.
    pub fn tracked_identities(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_limit_hit_on_next_request() {
        let windows = RateWindows::new();
        let now = Instant::now();
        for _ in 0..10 {
            windows
                .check_and_record_at("alice", 10, Some(10), None, now)
                .unwrap();
        }
        let err = windows
            .check_and_record_at("alice", 10, Some(10), None, now)
            .unwrap_err();
        assert_eq!(
            err,
            RateExceeded::Requests {
                observed: 10,
                limit: 10
            }
        );
    }

    #[test]
    fn test_window_slides() {
        let windows = RateWindows::new();
        let start = Instant::now();
        for _ in 0..10 {
            windows
                .check_and_record_at("bob", 1, Some(10), None, start)
                .unwrap();
        }
        // Inside the window: still limited.
        assert!(windows
            .check_and_record_at("bob", 1, Some(10), None, start + Duration::from_secs(30))
            .is_err());
        // Past the window: counters have drained.
        assert!(windows
            .check_and_record_at("bob", 1, Some(10), None, start + Duration::from_secs(61))
            .is_ok());
    }

    #[test]
    fn test_token_limit() {
        let windows = RateWindows::new();
        let now = Instant::now();
        windows
            .check_and_record_at("carol", 900, None, Some(1000), now)
            .unwrap();
        let err = windows
            .check_and_record_at("carol", 200, None, Some(1000), now)
            .unwrap_err();
        assert!(matches!(err, RateExceeded::Tokens { limit: 1000, .. }));
    }

    #[test]
    fn test_rejected_request_not_counted() {
        let windows = RateWindows::new();
        let now = Instant::now();
        windows
            .check_and_record_at("dave", 1, Some(1), None, now)
            .unwrap();
        for _ in 0..5 {
            assert!(windows
                .check_and_record_at("dave", 1, Some(1), None, now)
                .is_err());
        }
        // Only the single admitted request is in the window.
        assert!(windows
            .check_and_record_at("dave", 1, Some(2), None, now)
            .is_ok());
    }

    #[test]
    fn test_identities_independent() {
        let windows = RateWindows::new();
        let now = Instant::now();
        windows
            .check_and_record_at("x", 1, Some(1), None, now)
            .unwrap();
        assert!(windows.check_and_record_at("y", 1, Some(1), None, now).is_ok());
    }

    #[test]
    fn test_evict_idle() {
        let windows = RateWindows::new();
        windows.check_and_record("gone", 1, None, None).unwrap();
        assert_eq!(windows.tracked_identities(), 1);
        let evicted = windows.evict_idle(Duration::ZERO);
        assert_eq!(evicted, 1);
        assert_eq!(windows.tracked_identities(), 0);
    }
}
