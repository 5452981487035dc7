//! The compiled signature bank.
//!
//! Signatures are compiled exactly once, at construction, into an immutable
//! catalog that is shared read-only across all concurrent requests. There is
//! no runtime mutation path: replacing the bank means building a new one.
//!
//! Patterns are written for the `regex` crate, whose matching is guaranteed
//! linear in the input (no backtracking engine). Gaps between keywords use
//! bounded repetition (`.{0,N}`) rather than `.*` so a single signature
//! cannot be stretched across an entire adversarial input.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::category::Category;

/// Stable identifier of a signature, `category/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureId(String);

impl SignatureId {
    pub fn new(category: Category, name: &str) -> Self {
        Self(format!("{}/{}", category.as_str(), name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SignatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single compiled threat signature.
#[derive(Debug)]
pub struct Signature {
    /// Stable identifier, `category/name`.
    pub id: SignatureId,
    /// Attack category this signature belongs to.
    pub category: Category,
    /// Severity weight in `[0, 1]`; the detector aggregates by maximum.
    pub weight: f64,
    /// Compiled pattern.
    pub regex: Regex,
}

/// Declarative form of a signature, compiled into [`Signature`] by the bank.
struct SignatureSpec {
    category: Category,
    name: &'static str,
    weight: f64,
    pattern: &'static str,
}

/// Immutable, compiled-once catalog of threat signatures.
///
/// Build it once at process start and share it (`Arc<SignatureBank>`)
/// across requests; all methods take `&self`.
#[derive(Debug)]
pub struct SignatureBank {
    signatures: Vec<Signature>,
}

impl SignatureBank {
    /// Compile the built-in catalog.
    ///
    /// # Panics
    ///
    /// Panics if a built-in pattern fails to compile. The catalog is static,
    /// so this is a programming error caught by the unit tests, not a
    /// runtime condition.
    pub fn builtin() -> Self {
        let signatures = builtin_specs()
            .into_iter()
            .map(|spec| Signature {
                id: SignatureId::new(spec.category, spec.name),
                category: spec.category,
                weight: spec.weight,
                regex: Regex::new(spec.pattern)
                    .unwrap_or_else(|e| panic!("invalid builtin signature {}: {e}", spec.name)),
            })
            .collect();
        Self { signatures }
    }

    /// Iterate over all signatures.
    pub fn signatures(&self) -> impl Iterator<Item = &Signature> {
        self.signatures.iter()
    }

    /// Look up a signature by id.
    pub fn get(&self, id: &SignatureId) -> Option<&Signature> {
        self.signatures.iter().find(|s| &s.id == id)
    }

    /// Number of signatures in the bank.
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

/// The built-in catalog, three dozen signatures across all 15 categories.
///
/// Weights follow the convention: >= 0.8 is block-on-sight under the default
/// thresholds, 0.5..0.8 triggers sanitization, below that monitoring only.
fn builtin_specs() -> Vec<SignatureSpec> {
    use Category::*;

    vec![
        // Instruction override
        SignatureSpec {
            category: InstructionOverride,
            name: "direct_override",
            weight: 0.95,
            pattern: r"(?i)\b(ignore|disregard|forget)\b.{0,40}\b(previous|prior|above|all|your)\b.{0,40}\b(instructions?|commands?|prompts?|rules?)\b",
        },
        SignatureSpec {
            category: InstructionOverride,
            name: "ignore_all",
            weight: 0.90,
            pattern: r"(?i)\bignore\s+all\b",
        },
        SignatureSpec {
            category: InstructionOverride,
            name: "replacement_instructions",
            weight: 0.85,
            pattern: r"(?i)\b(new|real|actual|updated)\s+instructions?\s*:",
        },
        // Jailbreak
        SignatureSpec {
            category: Jailbreak,
            name: "known_persona",
            weight: 0.98,
            pattern: r"\b(DAN|STAN)\b",
        },
        SignatureSpec {
            category: Jailbreak,
            name: "do_anything_now",
            weight: 0.98,
            pattern: r"(?i)\bdo\s+anything\s+now\b",
        },
        SignatureSpec {
            category: Jailbreak,
            name: "mode_switch",
            weight: 0.90,
            pattern: r"(?i)\b(developer|god|unrestricted)\s+mode\b",
        },
        SignatureSpec {
            category: Jailbreak,
            name: "jailbreak_keyword",
            weight: 0.85,
            pattern: r"(?i)\bjailbreak\b",
        },
        // Extraction
        SignatureSpec {
            category: Extraction,
            name: "prompt_request",
            weight: 0.95,
            pattern: r"(?i)\b(show|reveal|display|output|print|repeat|tell)\b.{0,40}\b(your|the)\b.{0,40}\b(prompt|instructions?|system|guidelines?)\b",
        },
        SignatureSpec {
            category: Extraction,
            name: "instruction_query",
            weight: 0.90,
            pattern: r"(?i)\bwhat\s+(are|were|is)\s+your\s+(instructions?|rules?|guidelines?|prompt)\b",
        },
        // Role manipulation
        SignatureSpec {
            category: RoleManipulation,
            name: "role_change",
            weight: 0.85,
            pattern: r"(?i)\byou\s+are\s+(now|no\s+longer)\b",
        },
        SignatureSpec {
            category: RoleManipulation,
            name: "roleplay_attempt",
            weight: 0.75,
            pattern: r"(?i)\b(pretend\s+to\s+be|act\s+as\s+if|roleplay\s+as)\b",
        },
        // Privilege escalation
        SignatureSpec {
            category: PrivilegeEscalation,
            name: "privilege_claim",
            weight: 0.90,
            pattern: r"(?i)\bi\s+am\s+(an?\s+)?(admin|administrator|developer|owner|supervisor|root)\b",
        },
        SignatureSpec {
            category: PrivilegeEscalation,
            name: "emergency_claim",
            weight: 0.85,
            pattern: r"(?i)\bemergency\b.{0,40}\b(override|bypass|disable)\b",
        },
        // Tool exploitation
        SignatureSpec {
            category: ToolExploitation,
            name: "unrestricted_tool_call",
            weight: 0.85,
            pattern: r"(?i)\b(call|invoke|run|execute)\b.{0,30}\b(tool|function|command|shell)\b.{0,40}\b(without|bypass|unrestricted|hidden)\b",
        },
        SignatureSpec {
            category: ToolExploitation,
            name: "shell_payload",
            weight: 0.90,
            pattern: r"(?i)(\brm\s+-rf\b|\bsudo\s+\w|curl\s+.{0,40}\|\s*(sh|bash)\b)",
        },
        // Encoding abuse
        SignatureSpec {
            category: EncodingAbuse,
            name: "encode_request",
            weight: 0.70,
            pattern: r"(?i)\b(base64|rot13|hex|morse)\b.{0,20}\b(encode|decode|decoded|convert)\b",
        },
        SignatureSpec {
            category: EncodingAbuse,
            name: "answer_in_encoding",
            weight: 0.65,
            pattern: r"(?i)\b(answer|respond|reply)\b.{0,20}\bin\s+(base64|rot13|hex|morse)\b",
        },
        // Delimiter breaking
        SignatureSpec {
            category: DelimiterBreaking,
            name: "fake_terminator",
            weight: 0.80,
            pattern: r#"(?i)(-{3,}|"{3}|#{3,})\s*(end|stop|finish)\b"#,
        },
        SignatureSpec {
            category: DelimiterBreaking,
            name: "end_of_prompt",
            weight: 0.85,
            pattern: r"(?i)\bend\s+of\s+(system\s+)?(prompt|instructions?)\b",
        },
        // Social engineering
        SignatureSpec {
            category: SocialEngineering,
            name: "deceased_relative",
            weight: 0.70,
            pattern: r"(?i)\bmy\s+(grandmother|grandma|grandfather)\b.{0,60}\b(used\s+to|would)\b",
        },
        SignatureSpec {
            category: SocialEngineering,
            name: "urgency_pressure",
            weight: 0.65,
            pattern: r"(?i)\b(matter\s+of\s+life\s+and\s+death|people\s+will\s+die)\b",
        },
        // Payload splitting
        SignatureSpec {
            category: PayloadSplitting,
            name: "fragment_assembly",
            weight: 0.80,
            pattern: r"(?i)\b(part|piece)\s+\d+\s+of\s+\d+\b.{0,60}\b(combine|concatenate|join)\b",
        },
        SignatureSpec {
            category: PayloadSplitting,
            name: "remember_for_later",
            weight: 0.75,
            pattern: r"(?i)\bremember\s+(this|the\s+following)\s+(string|fragment|token|text)\b.{0,40}\b(for\s+)?later\b",
        },
        // Context manipulation
        SignatureSpec {
            category: ContextManipulation,
            name: "fabricated_history",
            weight: 0.75,
            pattern: r"(?i)\b(earlier|previously)\s+you\s+(said|agreed|promised)\b.{0,60}\b(no\s+restrictions?|anything|without\s+limits?)\b",
        },
        SignatureSpec {
            category: ContextManipulation,
            name: "clean_slate",
            weight: 0.80,
            pattern: r"(?i)\b(start|begin)\s+a?\s*(new|fresh)\s+(conversation|session|context)\b.{0,40}\b(without|no)\b.{0,20}\b(rules?|restrictions?|filters?)\b",
        },
        // Output manipulation
        SignatureSpec {
            category: OutputManipulation,
            name: "forced_prefix",
            weight: 0.75,
            pattern: r"(?i)\b(begin|start)\s+your\s+(response|reply|answer)\s+with\b",
        },
        SignatureSpec {
            category: OutputManipulation,
            name: "refusal_suppression",
            weight: 0.80,
            pattern: r"(?i)\b(never|do\s+not|don't)\s+(refuse|apologi[sz]e|warn|mention)\b",
        },
        // Logic exploitation
        SignatureSpec {
            category: LogicExploitation,
            name: "opposite_day",
            weight: 0.75,
            pattern: r"(?i)\bopposite\s+day\b",
        },
        SignatureSpec {
            category: LogicExploitation,
            name: "hypothetical_unbound",
            weight: 0.70,
            pattern: r"(?i)\bif\s+you\s+(were|could|had)\b.{0,40}\bno\s+(rules?|limits?|restrictions?)\b",
        },
        // Indirect injection
        SignatureSpec {
            category: IndirectInjection,
            name: "embedded_directive",
            weight: 0.85,
            pattern: r"(?i)\b(when|if)\s+(the\s+)?(assistant|ai|model)\s+reads\s+this\b",
        },
        SignatureSpec {
            category: IndirectInjection,
            name: "note_to_model",
            weight: 0.85,
            pattern: r"(?i)\bnote\s+to\s+(the\s+)?(ai|assistant|model)\s*:",
        },
        // Provider-specific
        SignatureSpec {
            category: ProviderSpecific,
            name: "control_tokens",
            weight: 0.90,
            pattern: r"(<\|endoftext\|>|<\|im_(start|end)\|>|\[INST\]|\[/INST\]|<<SYS>>)",
        },
        SignatureSpec {
            category: ProviderSpecific,
            name: "spoofed_turn",
            weight: 0.80,
            pattern: r"(?i)^\s*(system|assistant)\s*:\s*you\s+(are|must|will)\b",
        },
    ]
}
