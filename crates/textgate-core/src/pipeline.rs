//! The defense pipeline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use textgate_admission::{AdmissionGuard, RateWindows, Rejection, Tier};
use textgate_detect::{Action, Detector, RiskValidator};
use textgate_normalize::Normalizer;
use textgate_protect::OutputProtector;
use textgate_signatures::{Category, SignatureBank};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::events::{BoundedEventSink, EventSink, PipelineEvent};
use crate::generator::Generator;
use crate::session::{SessionStore, Turn};
use crate::stats::{MetricsSink, Outcome, PipelineStats, StatsSnapshot};
use crate::trace::{PipelineTrace, Stage};
use crate::verdict::BlockReason;

const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// One inbound request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateRequest {
    /// Caller identity used for rate limiting.
    pub identity: String,
    /// Conversation this request belongs to. One identity can hold
    /// several; [`GateRequest::new`] defaults it to the identity.
    pub session_id: String,
    /// Tier to admit this request at. `None` uses the session's tier.
    pub tier: Option<Tier>,
    /// Raw user text, exactly as received.
    pub text: String,
}

impl GateRequest {
    pub fn new(identity: impl Into<String>, text: impl Into<String>) -> Self {
        let identity = identity.into();
        Self {
            session_id: identity.clone(),
            identity,
            tier: None,
            text: text.into(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }
}

/// Terminal result for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResponse {
    /// Text to show the caller. For blocked requests this is a fixed safe
    /// message that never echoes request content.
    pub message: String,
    pub blocked: bool,
    pub block_reason: Option<BlockReason>,
    /// Final risk score after the obfuscation uplift.
    pub risk_score: f64,
    pub category: Option<Category>,
    /// The validator's ruling, when the request got that far.
    pub action: Option<Action>,
    pub trace: PipelineTrace,
}

/// Orders every defense layer into one request path.
///
/// Stages run in a fixed order: admission, normalization, detection,
/// validation, generation, output protection. Any stage can end the
/// request; once blocked nothing downstream runs, and provider failures
/// block rather than deliver an unchecked fallback. The pipeline is
/// fail-closed throughout.
pub struct Pipeline<G> {
    config: PipelineConfig,
    guard: AdmissionGuard,
    normalizer: Normalizer,
    detector: Detector,
    validator: RiskValidator,
    protector: OutputProtector,
    sessions: SessionStore,
    generator: G,
    stats: PipelineStats,
    events: Arc<dyn EventSink>,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl<G: Generator> Pipeline<G> {
    pub fn new(config: PipelineConfig, generator: G) -> Self {
        let windows = Arc::new(RateWindows::new());
        let bank = Arc::new(SignatureBank::builtin());
        let detector = Detector::new(bank);
        let validator = RiskValidator::new(detector.clone(), config.thresholds);
        let protector = OutputProtector::new(&config.protected, config.protector);
        let normalizer = Normalizer::new(config.normalizer.clone());
        let sessions = SessionStore::new(config.default_tier);

        info!(
            tier = config.default_tier.as_str(),
            block = config.thresholds.block,
            sanitize = config.thresholds.sanitize,
            "pipeline initialized"
        );

        Self {
            config,
            guard: AdmissionGuard::new(windows),
            normalizer,
            detector,
            validator,
            protector,
            sessions,
            generator,
            stats: PipelineStats::default(),
            events: Arc::new(BoundedEventSink::new(DEFAULT_EVENT_CAPACITY)),
            metrics: None,
        }
    }

    /// Replaces the default bounded event sink.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Forwards terminal latency/outcome observations to an external sink
    /// in addition to the built-in counters.
    pub fn with_metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(sink);
        self
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Runs one request through every stage and returns the terminal
    /// response. Never fails: every failure mode maps to a blocked
    /// response with a [`BlockReason`].
    pub async fn handle(&self, request: GateRequest) -> GateResponse {
        let mut trace = PipelineTrace::new();
        let started = Instant::now();
        self.stats.record_received();
        trace.record(Stage::Received, "ok", Duration::ZERO);
        self.emit(&trace, Stage::Received, &request.identity);

        // Admission: cheapest checks first. An explicit request tier
        // overrides and sticks to the session; rate limits stay keyed by
        // identity so parallel conversations share one budget.
        let session = self.sessions.touch(&request.session_id);
        let tier = match request.tier {
            Some(tier) => {
                self.sessions.set_tier(&request.session_id, tier);
                tier
            }
            None => session.tier,
        };
        let stage_start = Instant::now();
        let admission = self.guard.check(&request.text, &request.identity, tier);
        if let Some(rejection) = admission.rejection {
            trace.record(Stage::Admitted, "refused", stage_start.elapsed());
            let reason = match rejection {
                Rejection::RateLimited { detail } => BlockReason::RateLimited { detail },
                other => BlockReason::InputRejected { rejection: other },
            };
            return self.block(trace, reason, 0.0, None, None, started.elapsed());
        }
        trace.record(Stage::Admitted, "ok", stage_start.elapsed());

        // Normalization. A capped decode is itself a verdict.
        let stage_start = Instant::now();
        let normalized = self.normalizer.normalize(&request.text);
        if normalized.capped {
            trace.record(Stage::Normalized, "capped", stage_start.elapsed());
            warn!(identity = %request.identity, "decode expansion cap hit");
            return self.block(
                trace,
                BlockReason::NormalizationCapExceeded,
                1.0,
                None,
                None,
                started.elapsed(),
            );
        }
        let suspicion = normalized.suspicion_score();
        trace.record(Stage::Normalized, "ok", stage_start.elapsed());

        // Detection on the canonical form only.
        let stage_start = Instant::now();
        let detection = self.detector.detect(&normalized.canonical);
        trace.record(
            Stage::Detected,
            if detection.detected { "matched" } else { "clean" },
            stage_start.elapsed(),
        );

        // Validation.
        let stage_start = Instant::now();
        let decision = self
            .validator
            .validate(&normalized.canonical, &detection, suspicion);
        trace.record(
            Stage::Validated,
            format!("{:?}", decision.action).to_lowercase(),
            stage_start.elapsed(),
        );
        self.emit(&trace, Stage::Validated, &decision.reason);

        let forwarded = match decision.action {
            Action::Block => {
                return self.block(
                    trace,
                    BlockReason::DetectionBlocked {
                        category: detection.category,
                        risk: decision.risk_score,
                        reason: decision.reason.clone(),
                    },
                    decision.risk_score,
                    detection.category,
                    Some(decision.action),
                    started.elapsed(),
                );
            }
            Action::Sanitize => {
                self.stats.record_sanitized();
                // The matched spans only exist in the canonical form, so
                // the sanitized prompt is built from it.
                decision
                    .sanitized_text
                    .clone()
                    .unwrap_or_else(|| normalized.canonical.clone())
            }
            Action::Monitor => {
                debug!(
                    identity = %request.identity,
                    risk = decision.risk_score,
                    "low-risk match forwarded"
                );
                request.text.clone()
            }
            Action::Allow => request.text.clone(),
        };

        // Generation under a deadline, with one retry. History is the
        // session state as of admission.
        let stage_start = Instant::now();
        let reply = match self.generate_with_retry(&session.turns, &forwarded).await {
            Ok(reply) => reply,
            Err(reason) => {
                trace.record(Stage::Generated, "failed", stage_start.elapsed());
                return self.block(
                    trace,
                    reason,
                    decision.risk_score,
                    detection.category,
                    Some(decision.action),
                    started.elapsed(),
                );
            }
        };
        trace.record(Stage::Generated, "ok", stage_start.elapsed());

        // Output protection.
        let stage_start = Instant::now();
        let protected = self.protector.protect(&reply);
        if protected.blocked {
            trace.record(Stage::Protected, "withheld", stage_start.elapsed());
            let reason = protected
                .reason
                .unwrap_or_else(|| "protected material in reply".to_string());
            return self.block(
                trace,
                BlockReason::OutputWithheld { reason },
                decision.risk_score,
                detection.category,
                Some(decision.action),
                started.elapsed(),
            );
        }
        trace.record(
            Stage::Protected,
            if protected.redactions > 0 { "redacted" } else { "clean" },
            stage_start.elapsed(),
        );

        trace.record(Stage::Terminal, "delivered", started.elapsed());
        self.emit_terminal(&trace, "delivered");
        self.stats.record_delivered();
        self.emit_metrics(Outcome::Delivered, started.elapsed());
        self.sessions
            .record_turn(&request.session_id, &request.text, &protected.text);
        GateResponse {
            message: protected.text,
            blocked: false,
            block_reason: None,
            risk_score: decision.risk_score,
            category: detection.category,
            action: Some(decision.action),
            trace,
        }
    }

    async fn generate_with_retry(
        &self,
        history: &[Turn],
        input: &str,
    ) -> Result<String, BlockReason> {
        let deadline = Duration::from_millis(self.config.provider_timeout_ms);
        let mut timed_out = false;
        let mut last_error = String::new();

        for attempt in 1..=2u32 {
            if attempt > 1 {
                tokio::time::sleep(Duration::from_millis(self.config.retry_backoff_ms)).await;
            }
            let call = self
                .generator
                .generate(&self.config.protected.system_prompt, history, input);
            match tokio::time::timeout(deadline, call).await {
                Ok(Ok(reply)) => return Ok(reply),
                Ok(Err(err)) => {
                    warn!(attempt, error = %err, "provider call failed");
                    last_error = err.to_string();
                }
                Err(_) => {
                    warn!(attempt, ?deadline, "provider call timed out");
                    timed_out = true;
                }
            }
        }

        if timed_out {
            Err(BlockReason::ProviderTimeout { attempts: 2 })
        } else {
            Err(BlockReason::ProviderError { detail: last_error })
        }
    }

    fn block(
        &self,
        mut trace: PipelineTrace,
        reason: BlockReason,
        risk_score: f64,
        category: Option<Category>,
        action: Option<Action>,
        latency: Duration,
    ) -> GateResponse {
        let outcome = match &reason {
            BlockReason::ProviderTimeout { .. } | BlockReason::ProviderError { .. } => {
                self.stats.record_provider_failure();
                Outcome::ProviderFailure
            }
            r if r.is_input_side() => {
                self.stats.record_blocked_input();
                Outcome::BlockedInput
            }
            _ => {
                self.stats.record_blocked_output();
                Outcome::BlockedOutput
            }
        };
        self.emit_metrics(outcome, latency);
        info!(request_id = %trace.request_id, %reason, "request blocked");
        trace.record(Stage::Terminal, "blocked", Duration::ZERO);
        self.emit_terminal(&trace, &reason.to_string());
        GateResponse {
            message: reason.user_message().to_string(),
            blocked: true,
            block_reason: Some(reason),
            risk_score,
            category,
            action,
            trace,
        }
    }

    fn emit_metrics(&self, outcome: Outcome, latency: Duration) {
        if let Some(metrics) = &self.metrics {
            metrics.record(outcome, latency);
        }
    }

    fn emit(&self, trace: &PipelineTrace, stage: Stage, detail: &str) {
        self.events.record(PipelineEvent {
            request_id: trace.request_id,
            stage,
            detail: detail.to_string(),
            trace: None,
        });
    }

    /// Terminal events carry the completed trace so a sink can reconstruct
    /// per-stage timing without tracking intermediate events.
    fn emit_terminal(&self, trace: &PipelineTrace, detail: &str) {
        self.events.record(PipelineEvent {
            request_id: trace.request_id,
            stage: Stage::Terminal,
            detail: detail.to_string(),
            trace: Some(trace.clone()),
        });
    }
}
