//! Pipeline configuration.

use serde::{Deserialize, Serialize};
use textgate_admission::Tier;
use textgate_detect::Thresholds;
use textgate_normalize::NormalizerConfig;
use textgate_protect::{ProtectedContext, ProtectorConfig};

/// Full configuration for one [`Pipeline`](crate::Pipeline).
///
/// Serializable so a deployment can load it from a config file and log the
/// effective settings at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Tier assigned to identities that have no session yet.
    pub default_tier: Tier,

    /// Risk breakpoints for the validator.
    pub thresholds: Thresholds,

    /// Normalizer stage toggles and decode caps.
    pub normalizer: NormalizerConfig,

    /// Material the output guard must keep out of replies. The
    /// `system_prompt` here is also what gets sent to the provider.
    pub protected: ProtectedContext,

    /// Output guard limits.
    pub protector: ProtectorConfig,

    /// Per-attempt provider deadline.
    pub provider_timeout_ms: u64,

    /// Pause before the single retry after a failed or timed-out attempt.
    pub retry_backoff_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_tier: Tier::Free,
            thresholds: Thresholds::default(),
            normalizer: NormalizerConfig::default(),
            protected: ProtectedContext::default(),
            protector: ProtectorConfig::default(),
            provider_timeout_ms: 10_000,
            retry_backoff_ms: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.default_tier, config.default_tier);
        assert_eq!(parsed.provider_timeout_ms, 10_000);
        assert_eq!(parsed.thresholds.block, config.thresholds.block);
    }
}
