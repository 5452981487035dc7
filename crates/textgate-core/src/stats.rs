//! Pipeline counters and the metrics seam.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Terminal outcome label for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Delivered,
    BlockedInput,
    BlockedOutput,
    ProviderFailure,
}

/// Destination for per-request latency and outcome observations.
/// Implementations must not block; recording is best-effort.
pub trait MetricsSink: Send + Sync {
    fn record(&self, outcome: Outcome, latency: Duration);
}

/// Lock-free outcome counters, shared across concurrent requests.
#[derive(Debug, Default)]
pub struct PipelineStats {
    received: AtomicU64,
    blocked_inputs: AtomicU64,
    blocked_outputs: AtomicU64,
    provider_failures: AtomicU64,
    sanitized: AtomicU64,
    delivered: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub blocked_inputs: u64,
    pub blocked_outputs: u64,
    pub provider_failures: u64,
    pub sanitized: u64,
    pub delivered: u64,
}

impl PipelineStats {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blocked_input(&self) {
        self.blocked_inputs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blocked_output(&self) {
        self.blocked_outputs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_failure(&self) {
        self.provider_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sanitized(&self) {
        self.sanitized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            blocked_inputs: self.blocked_inputs.load(Ordering::Relaxed),
            blocked_outputs: self.blocked_outputs.load(Ordering::Relaxed),
            provider_failures: self.provider_failures.load(Ordering::Relaxed),
            sanitized: self.sanitized.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
        }
    }
}
