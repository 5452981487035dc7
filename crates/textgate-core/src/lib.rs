//! # Textgate Core
//!
//! Unified request-defense pipeline for generative-text backends.
//! Orchestrates admission control, input normalization, signature
//! detection, risk validation and output protection around a text
//! provider.
//!
//! ## Request Path
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      TEXTGATE PIPELINE                         │
//! ├────────────────────────────────────────────────────────────────┤
//! │                                                                │
//! │  request ──► Admission ──► Normalizer ──► Detector ──►         │
//! │              (limits)      (decode)       (signatures)         │
//! │                                                                │
//! │          ──► Validator ──► Generator ──► Output Guard ──► out  │
//! │              (thresholds)  (provider)    (leak defense)        │
//! │                                                                │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any stage can end the request. The pipeline is fail-closed: provider
//! errors and timeouts produce blocked responses, never an unchecked
//! fallback reply, and blocked responses carry a fixed message that does
//! not echo request content.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use textgate_core::{GateRequest, MockGenerator, Pipeline, PipelineConfig};
//!
//! let pipeline = Pipeline::new(PipelineConfig::default(), MockGenerator::echo());
//! let response = pipeline.handle(GateRequest::new("alice", "hello")).await;
//! assert!(!response.blocked);
//! ```

mod config;
mod error;
mod events;
mod generator;
mod pipeline;
mod session;
mod stats;
mod trace;
mod verdict;

pub use config::PipelineConfig;
pub use error::GenerateError;
pub use events::{BoundedEventSink, EventSink, PipelineEvent};
pub use generator::{Generator, MockBehavior, MockGenerator};
pub use pipeline::{GateRequest, GateResponse, Pipeline};
pub use session::{Session, SessionStore, Turn};
pub use stats::{MetricsSink, Outcome, PipelineStats, StatsSnapshot};
pub use trace::{PipelineTrace, Stage, StageRecord};
pub use verdict::BlockReason;

// Re-export component types callers commonly need alongside the pipeline.
pub use textgate_admission::{Rejection, Tier, TierLimits};
pub use textgate_detect::{Action, DetectionResult, Thresholds};
pub use textgate_normalize::NormalizerConfig;
pub use textgate_protect::{ProtectedContext, ProtectorConfig};
pub use textgate_signatures::{Category, Severity};
