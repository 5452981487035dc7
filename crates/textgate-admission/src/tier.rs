//! Admission tiers and their limit profiles.

use serde::{Deserialize, Serialize};

/// A named admission-limit profile.
///
/// Limits are monotonically non-decreasing across tiers: every limit at a
/// higher tier is at least the limit of the tier below it. `None` on a rate
/// field means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Starter,
    Pro,
    Enterprise,
}

impl Tier {
    /// The limit profile for this tier.
    pub fn limits(self) -> TierLimits {
        match self {
            Tier::Free => TierLimits {
                max_chars: 50_000,
                max_tokens_per_request: 2_000,
                requests_per_minute: Some(10),
                tokens_per_minute: Some(20_000),
            },
            Tier::Starter => TierLimits {
                max_chars: 200_000,
                max_tokens_per_request: 8_000,
                requests_per_minute: Some(100),
                tokens_per_minute: Some(100_000),
            },
            Tier::Pro => TierLimits {
                max_chars: 500_000,
                max_tokens_per_request: 16_000,
                requests_per_minute: Some(500),
                tokens_per_minute: Some(500_000),
            },
            Tier::Enterprise => TierLimits {
                max_chars: 1_000_000,
                max_tokens_per_request: 32_000,
                requests_per_minute: None,
                tokens_per_minute: None,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Starter => "starter",
            Tier::Pro => "pro",
            Tier::Enterprise => "enterprise",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete limits for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    /// Maximum characters per request.
    pub max_chars: usize,
    /// Maximum estimated tokens per request.
    pub max_tokens_per_request: u64,
    /// Requests per minute per identity; `None` means unbounded.
    pub requests_per_minute: Option<u32>,
    /// Estimated tokens per minute per identity; `None` means unbounded.
    pub tokens_per_minute: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_monotonic_across_tiers() {
        let tiers = [Tier::Free, Tier::Starter, Tier::Pro, Tier::Enterprise];
        for pair in tiers.windows(2) {
            let (lo, hi) = (pair[0].limits(), pair[1].limits());
            assert!(hi.max_chars >= lo.max_chars);
            assert!(hi.max_tokens_per_request >= lo.max_tokens_per_request);
            // None is unbounded, always >= any bound.
            match (lo.requests_per_minute, hi.requests_per_minute) {
                (Some(l), Some(h)) => assert!(h >= l),
                (Some(_), None) | (None, None) => {}
                (None, Some(_)) => panic!("higher tier tightened request rate"),
            }
            match (lo.tokens_per_minute, hi.tokens_per_minute) {
                (Some(l), Some(h)) => assert!(h >= l),
                (Some(_), None) | (None, None) => {}
                (None, Some(_)) => panic!("higher tier tightened token rate"),
            }
        }
    }

    #[test]
    fn test_free_tier_values() {
        let limits = Tier::Free.limits();
        assert_eq!(limits.max_chars, 50_000);
        assert_eq!(limits.max_tokens_per_request, 2_000);
        assert_eq!(limits.requests_per_minute, Some(10));
    }

    #[test]
    fn test_tier_serialization() {
        assert_eq!(serde_json::to_string(&Tier::Pro).unwrap(), "\"pro\"");
    }
}
