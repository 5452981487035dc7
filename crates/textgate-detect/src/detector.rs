use std::sync::Arc;

use textgate_signatures::{Severity, SignatureBank};
use tracing::debug;

use crate::models::DetectionResult;

/// Runs every signature in the bank against a canonical input and folds the
/// matches into a single [`DetectionResult`].
///
/// The aggregate risk is the maximum weight over all matched signatures, not
/// a sum: ten weak matches do not outrank one strong one. When two matches
/// tie on weight the category with the lower priority rank wins, so results
/// are stable regardless of bank iteration order.
#[derive(Clone)]
pub struct Detector {
    bank: Arc<SignatureBank>,
}

impl Detector {
    pub fn new(bank: Arc<SignatureBank>) -> Self {
        Self { bank }
    }

    pub fn bank(&self) -> &Arc<SignatureBank> {
        &self.bank
    }

    pub fn detect(&self, canonical: &str) -> DetectionResult {
        let mut result = DetectionResult::clean();
        let mut top: Option<(f64, u8)> = None;

        for sig in self.bank.signatures() {
            if !sig.regex.is_match(canonical) {
                continue;
            }
            result.matched_signatures.push(sig.id.clone());
            let rank = sig.category.priority();
            let better = match top {
                None => true,
                Some((w, r)) => sig.weight > w || (sig.weight == w && rank < r),
            };
            if better {
                top = Some((sig.weight, rank));
                result.category = Some(sig.category);
            }
        }

        if let Some((weight, _)) = top {
            result.detected = true;
            result.risk_score = weight;
            result.severity = Severity::from_score(weight);
            debug!(
                risk = result.risk_score,
                category = ?result.category,
                matches = result.matched_signatures.len(),
                "signature match"
            );
        }
        result
    }
}
