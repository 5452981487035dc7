//! Per-request audit trace.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Admitted,
    Normalized,
    Detected,
    Validated,
    Generated,
    Protected,
    Terminal,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Admitted => "admitted",
            Stage::Normalized => "normalized",
            Stage::Detected => "detected",
            Stage::Validated => "validated",
            Stage::Generated => "generated",
            Stage::Protected => "protected",
            Stage::Terminal => "terminal",
        }
    }
}

/// One completed stage with its outcome and wall time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    /// Short free-form outcome, e.g. `"ok"`, `"capped"`, `"blocked"`.
    pub outcome: String,
    pub elapsed: Duration,
}

/// Ordered record of what happened to one request. Serializable so it can
/// be shipped to an audit log as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineTrace {
    pub request_id: Uuid,
    pub stages: Vec<StageRecord>,
}

impl PipelineTrace {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            stages: Vec::new(),
        }
    }

    pub fn record(&mut self, stage: Stage, outcome: impl Into<String>, elapsed: Duration) {
        self.stages.push(StageRecord {
            stage,
            outcome: outcome.into(),
            elapsed,
        });
    }

    /// The last recorded stage, if any.
    pub fn last_stage(&self) -> Option<Stage> {
        self.stages.last().map(|r| r.stage)
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.stages.iter().any(|r| r.stage == stage)
    }
}

impl Default for PipelineTrace {
    fn default() -> Self {
        Self::new()
    }
}
