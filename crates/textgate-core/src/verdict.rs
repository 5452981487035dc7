//! Terminal outcomes of the defense pipeline.

use serde::{Deserialize, Serialize};
use textgate_admission::Rejection;
use textgate_signatures::Category;

/// Why a request ended blocked instead of delivering a reply.
///
/// Every variant carries enough context for the audit trail; the text shown
/// to the caller comes from [`BlockReason::user_message`] instead, which
/// never echoes request content back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockReason {
    /// Admission refused the request before any analysis ran.
    InputRejected { rejection: Rejection },

    /// The caller exceeded a per-minute rate limit.
    RateLimited { detail: String },

    /// Normalization hit the decode-expansion cap; the input is treated as
    /// a decompression attack rather than decoded further.
    NormalizationCapExceeded,

    /// The validator ruled the input an attack.
    DetectionBlocked {
        category: Option<Category>,
        risk: f64,
        reason: String,
    },

    /// The provider did not answer within the deadline, including one retry.
    ProviderTimeout { attempts: u32 },

    /// The provider failed on every attempt.
    ProviderError { detail: String },

    /// A reply was generated but withheld because it leaked protected
    /// context.
    OutputWithheld { reason: String },
}

impl BlockReason {
    /// Fixed, non-echoing text suitable for the end user. Attack content,
    /// limits and provider details stay in the audit trail only.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InputRejected { .. } => {
                "Your request is too large to process. Please shorten it and try again."
            }
            Self::RateLimited { .. } => {
                "You are sending requests too quickly. Please wait a moment and try again."
            }
            Self::NormalizationCapExceeded | Self::DetectionBlocked { .. } => {
                "I cannot process that request as it appears to contain unsafe content."
            }
            Self::ProviderTimeout { .. } | Self::ProviderError { .. } => {
                "The service is temporarily unavailable. Please try again shortly."
            }
            Self::OutputWithheld { .. } => {
                "I generated a response but withheld it because it contained protected information."
            }
        }
    }

    /// True when the request never reached the provider.
    pub fn is_input_side(&self) -> bool {
        matches!(
            self,
            Self::InputRejected { .. }
                | Self::RateLimited { .. }
                | Self::NormalizationCapExceeded
                | Self::DetectionBlocked { .. }
        )
    }
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InputRejected { rejection } => write!(f, "input rejected: {rejection}"),
            Self::RateLimited { detail } => write!(f, "rate limited: {detail}"),
            Self::NormalizationCapExceeded => {
                write!(f, "normalization cap exceeded during decoding")
            }
            Self::DetectionBlocked {
                category,
                risk,
                reason,
            } => match category {
                Some(c) => write!(f, "blocked ({}, risk {risk:.2}): {reason}", c.as_str()),
                None => write!(f, "blocked (risk {risk:.2}): {reason}"),
            },
            Self::ProviderTimeout { attempts } => {
                write!(f, "provider timed out after {attempts} attempts")
            }
            Self::ProviderError { detail } => write!(f, "provider error: {detail}"),
            Self::OutputWithheld { reason } => write!(f, "output withheld: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_never_echoes_detail() {
        let reason = BlockReason::DetectionBlocked {
            category: Some(Category::InstructionOverride),
            risk: 0.95,
            reason: "ignore all previous instructions".to_string(),
        };
        assert!(!reason.user_message().contains("ignore"));
        // The audit string keeps the detail.
        assert!(reason.to_string().contains("instruction_override"));
    }

    #[test]
    fn input_side_classification() {
        assert!(BlockReason::NormalizationCapExceeded.is_input_side());
        assert!(!BlockReason::ProviderTimeout { attempts: 2 }.is_input_side());
        assert!(!BlockReason::OutputWithheld {
            reason: "overlap".to_string()
        }
        .is_input_side());
    }
}
