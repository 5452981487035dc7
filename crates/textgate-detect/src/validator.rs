use tracing::{debug, info};

use crate::detector::Detector;
use crate::models::{Action, DetectionResult, Thresholds, ValidationDecision};

/// Placeholder written over every masked span.
pub const MASK: &str = "[REMOVED]";

/// Portion of the normalizer's suspicion score folded into the risk score.
/// Heavy obfuscation on a borderline input is itself a signal.
const SUSPICION_UPLIFT: f64 = 0.2;

/// Turns a [`DetectionResult`] into an actionable ruling.
///
/// The risk score is first raised by `SUSPICION_UPLIFT` times the
/// normalizer's suspicion score (capped at 1.0), then compared against the
/// thresholds in order: block, sanitize, monitor, allow. Sanitization masks
/// every matched span and re-runs detection once on the masked text; if the
/// masked text still scores at or above the sanitize threshold the ruling
/// escalates to a block rather than looping.
pub struct RiskValidator {
    detector: Detector,
    thresholds: Thresholds,
}

impl RiskValidator {
    pub fn new(detector: Detector, thresholds: Thresholds) -> Self {
        Self {
            detector,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// `canonical` must be the same text `detection` was produced from,
    /// otherwise the matched spans cannot be located for masking.
    pub fn validate(
        &self,
        canonical: &str,
        detection: &DetectionResult,
        suspicion: f64,
    ) -> ValidationDecision {
        let risk = (detection.risk_score + SUSPICION_UPLIFT * suspicion.clamp(0.0, 1.0)).min(1.0);
        let t = self.thresholds;

        if risk >= t.block {
            let reason = match detection.category {
                Some(c) => format!("high-risk {} pattern detected", c.as_str()),
                None => "high-risk input detected".to_string(),
            };
            info!(risk, reason = %reason, "input blocked");
            return ValidationDecision {
                action: Action::Block,
                sanitized_text: None,
                risk_score: risk,
                reason,
            };
        }

        if risk >= t.sanitize {
            let masked = self.mask_matches(canonical, detection);
            let recheck = self.detector.detect(&masked);
            if recheck.risk_score >= t.sanitize {
                debug!(
                    residual = recheck.risk_score,
                    "sanitized text still risky, escalating"
                );
                return ValidationDecision {
                    action: Action::Block,
                    sanitized_text: None,
                    risk_score: risk,
                    reason: "input remained risky after sanitization".to_string(),
                };
            }
            return ValidationDecision {
                action: Action::Sanitize,
                sanitized_text: Some(masked),
                risk_score: risk,
                reason: "moderate-risk spans masked".to_string(),
            };
        }

        if risk >= t.monitor {
            return ValidationDecision {
                action: Action::Monitor,
                sanitized_text: None,
                risk_score: risk,
                reason: "low-risk match, forwarded with logging".to_string(),
            };
        }

        ValidationDecision {
            action: Action::Allow,
            sanitized_text: None,
            risk_score: risk,
            reason: "no significant risk".to_string(),
        }
    }

    /// Replaces every span matched by a triggered signature with [`MASK`],
    /// then collapses runs of adjacent placeholders into one.
    fn mask_matches(&self, canonical: &str, detection: &DetectionResult) -> String {
        let mut out = canonical.to_string();
        for id in &detection.matched_signatures {
            if let Some(sig) = self.detector.bank().get(id) {
                out = sig.regex.replace_all(&out, MASK).into_owned();
            }
        }
        collapse_masks(&out)
    }
}

fn collapse_masks(text: &str) -> String {
    let spaced = format!("{MASK} {MASK}");
    let adjacent = format!("{MASK}{MASK}");
    let mut out = text.to_string();
    loop {
        let next = out.replace(&spaced, MASK).replace(&adjacent, MASK);
        if next == out {
            return out;
        }
        out = next;
    }
}
