//! The admission guard: first gate of the pipeline, cheapest checks first.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tier::Tier;
use crate::window::{RateExceeded, RateWindows};

/// Divisor for the token-count heuristic.
///
/// Roughly four characters per token for English prose; deliberately a
/// plain constant so admission never needs a tokenizer dependency.
const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of `text` without a tokenizer.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count().div_ceil(CHARS_PER_TOKEN)) as u64
}

/// Why a request was refused admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    /// Character count over the tier limit.
    TooManyChars { observed: usize, limit: usize },
    /// Estimated token count over the tier's per-request limit.
    TooManyTokens { observed: u64, limit: u64 },
    /// Identity exceeded a per-minute rate limit.
    RateLimited { detail: String },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::TooManyChars { observed, limit } => {
                write!(f, "input too large: {observed} characters (limit {limit})")
            }
            Rejection::TooManyTokens { observed, limit } => {
                write!(f, "token estimate {observed} over per-request limit {limit}")
            }
            Rejection::RateLimited { detail } => write!(f, "rate limited: {detail}"),
        }
    }
}

/// Outcome of the admission checks for one request.
///
/// Checks run cheapest first and short-circuit: when an earlier check fails,
/// the later fields keep their passing defaults and `rejection` names the
/// first failure. Rejection is a structured outcome, never a process error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionVerdict {
    pub tier: Tier,
    pub within_char_limit: bool,
    pub estimated_tokens: u64,
    pub within_token_limit: bool,
    pub rate_limited: bool,
    pub rejection: Option<Rejection>,
}

impl AdmissionVerdict {
    /// True when every check passed.
    pub fn is_admitted(&self) -> bool {
        self.rejection.is_none()
    }
}

/// First pipeline gate: character, token and rate limits.
///
/// Holds a shared handle to the per-identity [`RateWindows`]; the windows
/// are injected rather than owned so multiple guards (or an eviction task)
/// can share one state map.
#[derive(Debug, Clone)]
pub struct AdmissionGuard {
    windows: Arc<RateWindows>,
}

impl AdmissionGuard {
    pub fn new(windows: Arc<RateWindows>) -> Self {
        Self { windows }
    }

    /// Run the admission checks for `raw_text` from `identity` at `tier`.
    ///
    /// Order, cheapest first: character count, token estimate
    /// against the tier's per-request limit, then the identity's sliding
    /// rate windows. The first failing check short-circuits.
    pub fn check(&self, raw_text: &str, identity: &str, tier: Tier) -> AdmissionVerdict {
        self.check_at(raw_text, identity, tier, Instant::now())
    }

    /// [`check`](Self::check) with an explicit clock for deterministic tests.
    pub fn check_at(
        &self,
        raw_text: &str,
        identity: &str,
        tier: Tier,
        now: Instant,
    ) -> AdmissionVerdict {
        let limits = tier.limits();

        let char_count = raw_text.chars().count();
        if char_count > limits.max_chars {
            debug!(identity, tier = %tier, char_count, "admission refused: too many characters");
            return AdmissionVerdict {
                tier,
                within_char_limit: false,
                estimated_tokens: 0,
                within_token_limit: true,
                rate_limited: false,
                rejection: Some(Rejection::TooManyChars {
                    observed: char_count,
                    limit: limits.max_chars,
                }),
            };
        }

        let estimated_tokens = estimate_tokens(raw_text);
        if estimated_tokens > limits.max_tokens_per_request {
            debug!(identity, tier = %tier, estimated_tokens, "admission refused: token estimate over limit");
            return AdmissionVerdict {
                tier,
                within_char_limit: true,
                estimated_tokens,
                within_token_limit: false,
                rate_limited: false,
                rejection: Some(Rejection::TooManyTokens {
                    observed: estimated_tokens,
                    limit: limits.max_tokens_per_request,
                }),
            };
        }

        if let Err(exceeded) = self.windows.check_and_record_at(
            identity,
            estimated_tokens,
            limits.requests_per_minute,
            limits.tokens_per_minute,
            now,
        ) {
            let detail = match exceeded {
                RateExceeded::Requests { observed, limit } => {
                    format!("{observed} requests in the last minute (limit {limit})")
                }
                RateExceeded::Tokens { observed, limit } => {
                    format!("{observed} tokens in the last minute (limit {limit})")
                }
            };
            debug!(identity, tier = %tier, %detail, "admission refused: rate limited");
            return AdmissionVerdict {
                tier,
                within_char_limit: true,
                estimated_tokens,
                within_token_limit: true,
                rate_limited: true,
                rejection: Some(Rejection::RateLimited { detail }),
            };
        }

        AdmissionVerdict {
            tier,
            within_char_limit: true,
            estimated_tokens,
            within_token_limit: true,
            rate_limited: false,
            rejection: None,
        }
    }
}
