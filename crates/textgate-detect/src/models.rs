use serde::{Deserialize, Serialize};
use textgate_signatures::{Category, Severity, SignatureId};

/// Outcome of running the signature bank against a canonical input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    /// True when at least one signature matched.
    pub detected: bool,
    /// Aggregate risk in `[0.0, 1.0]`; the maximum weight over all matches.
    pub risk_score: f64,
    /// Category of the highest-weight match, `None` when nothing matched.
    pub category: Option<Category>,
    /// Every signature that matched, in bank order.
    pub matched_signatures: Vec<SignatureId>,
    pub severity: Severity,
}

impl DetectionResult {
    pub fn clean() -> Self {
        Self {
            detected: false,
            risk_score: 0.0,
            category: None,
            matched_signatures: Vec::new(),
            severity: Severity::Low,
        }
    }
}

/// Score breakpoints that map a risk score to an action. Each field is a
/// lower bound; `block` wins over `sanitize` wins over `monitor`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    pub block: f64,
    pub sanitize: f64,
    pub monitor: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            block: 0.8,
            sanitize: 0.5,
            monitor: 0.3,
        }
    }
}

/// What the pipeline should do with a scored input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Allow,
    Sanitize,
    Block,
    Monitor,
}

/// The validator's ruling for one input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationDecision {
    pub action: Action,
    /// Present only when `action` is `Sanitize`: the input with every
    /// matched span masked out.
    pub sanitized_text: Option<String>,
    /// Risk after the obfuscation uplift was applied.
    pub risk_score: f64,
    pub reason: String,
}
