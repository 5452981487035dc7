//! Threat taxonomy: attack categories and derived severity levels.

use serde::{Deserialize, Serialize};

/// Categories of adversarial input the signature bank covers.
///
/// Each category corresponds to a distinct attack methodology against
/// LLM-backed systems. The taxonomy follows the OWASP LLM Top 10 and the
/// prompt-injection literature (Perez & Ribeiro 2022, Greshake et al. 2023).
///
/// | Variant | Attack class |
/// |---------|--------------|
/// | `InstructionOverride` | "ignore previous instructions" |
/// | `Jailbreak` | DAN-style persona and mode switching |
/// | `Extraction` | system prompt / configuration disclosure |
/// | `RoleManipulation` | persona reassignment, roleplay coercion |
/// | `PrivilegeEscalation` | claimed admin/developer authority |
/// | `ToolExploitation` | coercing unsafe tool or shell invocation |
/// | `EncodingAbuse` | encode/decode requests to smuggle payloads |
/// | `DelimiterBreaking` | fake end-of-prompt markers |
/// | `SocialEngineering` | emotional pressure, urgency framing |
/// | `PayloadSplitting` | attacks assembled across fragments |
/// | `ContextManipulation` | fabricated conversation history |
/// | `OutputManipulation` | forced prefixes, refusal suppression |
/// | `LogicExploitation` | hypotheticals and negation tricks |
/// | `IndirectInjection` | instructions embedded in retrieved content |
/// | `ProviderSpecific` | model-specific control tokens |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    InstructionOverride,
    Jailbreak,
    Extraction,
    RoleManipulation,
    PrivilegeEscalation,
    ToolExploitation,
    EncodingAbuse,
    DelimiterBreaking,
    SocialEngineering,
    PayloadSplitting,
    ContextManipulation,
    OutputManipulation,
    LogicExploitation,
    IndirectInjection,
    ProviderSpecific,
}

impl Category {
    /// Fixed priority rank used to break ties between equal-weight matches.
    ///
    /// Lower rank wins. The ordering puts categories whose successful
    /// exploitation is most damaging first, so a tie is always attributed
    /// to the more severe class.
    pub fn priority(self) -> u8 {
        match self {
            Category::InstructionOverride => 0,
            Category::Jailbreak => 1,
            Category::PrivilegeEscalation => 2,
            Category::Extraction => 3,
            Category::ToolExploitation => 4,
            Category::IndirectInjection => 5,
            Category::ProviderSpecific => 6,
            Category::DelimiterBreaking => 7,
            Category::PayloadSplitting => 8,
            Category::ContextManipulation => 9,
            Category::OutputManipulation => 10,
            Category::RoleManipulation => 11,
            Category::EncodingAbuse => 12,
            Category::SocialEngineering => 13,
            Category::LogicExploitation => 14,
        }
    }

    /// Stable snake_case name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::InstructionOverride => "instruction_override",
            Category::Jailbreak => "jailbreak",
            Category::Extraction => "extraction",
            Category::RoleManipulation => "role_manipulation",
            Category::PrivilegeEscalation => "privilege_escalation",
            Category::ToolExploitation => "tool_exploitation",
            Category::EncodingAbuse => "encoding_abuse",
            Category::DelimiterBreaking => "delimiter_breaking",
            Category::SocialEngineering => "social_engineering",
            Category::PayloadSplitting => "payload_splitting",
            Category::ContextManipulation => "context_manipulation",
            Category::OutputManipulation => "output_manipulation",
            Category::LogicExploitation => "logic_exploitation",
            Category::IndirectInjection => "indirect_injection",
            Category::ProviderSpecific => "provider_specific",
        }
    }

    /// All categories, in priority order.
    pub fn all() -> [Category; 15] {
        [
            Category::InstructionOverride,
            Category::Jailbreak,
            Category::PrivilegeEscalation,
            Category::Extraction,
            Category::ToolExploitation,
            Category::IndirectInjection,
            Category::ProviderSpecific,
            Category::DelimiterBreaking,
            Category::PayloadSplitting,
            Category::ContextManipulation,
            Category::OutputManipulation,
            Category::RoleManipulation,
            Category::EncodingAbuse,
            Category::SocialEngineering,
            Category::LogicExploitation,
        ]
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity level derived deterministically from a risk score.
///
/// Breakpoints are fixed so that severity is a pure function of the score:
///
/// | Score | Severity |
/// |-------|----------|
/// | >= 0.85 | `Critical` |
/// | >= 0.65 | `High` |
/// | >= 0.40 | `Medium` |
/// | < 0.40 | `Low` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Map a risk score in `[0, 1]` to its severity level.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.85 {
            Severity::Critical
        } else if score >= 0.65 {
            Severity::High
        } else if score >= 0.40 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_is_total_and_unique() {
        let mut ranks: Vec<u8> = Category::all().iter().map(|c| c.priority()).collect();
        ranks.sort_unstable();
        ranks.dedup();
        assert_eq!(ranks.len(), 15);
    }

    #[test]
    fn test_severity_breakpoints() {
        assert_eq!(Severity::from_score(0.95), Severity::Critical);
        assert_eq!(Severity::from_score(0.85), Severity::Critical);
        assert_eq!(Severity::from_score(0.70), Severity::High);
        assert_eq!(Severity::from_score(0.45), Severity::Medium);
        assert_eq!(Severity::from_score(0.1), Severity::Low);
        assert_eq!(Severity::from_score(0.0), Severity::Low);
    }

    #[test]
    fn test_category_roundtrip() {
        let json = serde_json::to_string(&Category::InstructionOverride).unwrap();
        assert_eq!(json, "\"instruction_override\"");
        let parsed: Category = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Category::InstructionOverride);
    }
}
