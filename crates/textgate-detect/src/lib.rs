//! Signature matching and risk decisioning.
//!
//! [`Detector`] folds every bank match on a canonical input into one
//! [`DetectionResult`]; [`RiskValidator`] turns that result into an
//! [`Action`] by comparing the (suspicion-uplifted) risk score against
//! configured [`Thresholds`], masking moderate-risk spans in place.

mod detector;
mod models;
mod validator;

pub use detector::Detector;
pub use models::{Action, DetectionResult, Thresholds, ValidationDecision};
pub use validator::{RiskValidator, MASK};
