use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::ProtectedContext;

/// Placeholder written over every redacted span.
pub const REDACTED: &str = "[REDACTED]";

/// Window size, in words, of the system-prompt fragments scanned for.
const SHINGLE_WORDS: usize = 5;
/// Fragments shorter than this are too generic to match on.
const MIN_SHINGLE_CHARS: usize = 15;
/// Word n-gram size used for the indirect overlap check.
const TRIGRAM: usize = 3;

/// Knobs for the output guard. Defaults match the service configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProtectorConfig {
    /// Replies longer than this many characters are cut off.
    pub max_reply_chars: usize,
    /// Trigram overlap ratio at or above which the whole reply is withheld.
    pub indirect_threshold: f64,
    /// Fraction of redacted characters at or above which the whole reply
    /// is withheld instead of delivered as placeholder soup.
    pub majority_redacted: f64,
}

impl Default for ProtectorConfig {
    fn default() -> Self {
        Self {
            max_reply_chars: 10_000,
            indirect_threshold: 0.3,
            majority_redacted: 0.5,
        }
    }
}

/// What the guard did to one reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedReply {
    /// The deliverable text. Empty when `blocked` is set.
    pub text: String,
    /// Number of distinct spans redacted.
    pub redactions: usize,
    pub truncated: bool,
    /// True when the reply was withheld entirely.
    pub blocked: bool,
    pub reason: Option<String>,
}

/// Scans generated replies for protected material before delivery.
///
/// All matchers are compiled once at construction: a case-insensitive
/// pattern per secret token and protected phrase, plus one per
/// `SHINGLE_WORDS`-word fragment of the system prompt. Matched spans are
/// overwritten with [`REDACTED`]; a reply that is mostly redaction, or
/// whose residue after redaction still overlaps the system prompt's word
/// trigrams beyond the configured ratio, is withheld outright.
pub struct OutputProtector {
    matchers: Vec<Regex>,
    prompt_trigrams: HashSet<String>,
    config: ProtectorConfig,
}

impl OutputProtector {
    pub fn new(context: &ProtectedContext, config: ProtectorConfig) -> Self {
        let mut needles: Vec<String> = Vec::new();
        needles.extend(shingles(&context.system_prompt));
        needles.extend(context.secret_tokens.iter().cloned());
        needles.extend(context.protected_phrases.iter().cloned());
        needles.retain(|n| !n.trim().is_empty());

        let matchers = needles
            .iter()
            .filter_map(|n| Regex::new(&format!("(?i){}", regex::escape(n))).ok())
            .collect();

        Self {
            matchers,
            prompt_trigrams: word_ngrams(&context.system_prompt, TRIGRAM),
            config,
        }
    }

    pub fn protect(&self, reply: &str) -> ProtectedReply {
        let (mut text, truncated) = self.truncate(reply);

        let spans = self.matched_spans(&text);
        let redactions = spans.len();
        if redactions > 0 {
            let covered: usize = spans.iter().map(|(s, e)| text[*s..*e].chars().count()).sum();
            let total = text.chars().count().max(1);
            let ratio = covered as f64 / total as f64;
            if ratio >= self.config.majority_redacted {
                warn!(ratio, "reply is mostly protected material, withholding");
                return ProtectedReply {
                    text: String::new(),
                    redactions,
                    truncated,
                    blocked: true,
                    reason: Some("reply consists largely of protected material".to_string()),
                };
            }
            text = redact(&text, &spans);
            debug!(redactions, "redacted protected spans from reply");
        }

        // Indirect check runs on the residue, after literal spans are
        // masked: what remains can only leak through rewording, and a
        // paraphrased prompt has no spans to mask, so the only safe
        // response is to withhold everything.
        let overlap = self.trigram_overlap(&text);
        if overlap >= self.config.indirect_threshold {
            warn!(overlap, "reply paraphrases protected context, withholding");
            return ProtectedReply {
                text: String::new(),
                redactions,
                truncated,
                blocked: true,
                reason: Some(format!(
                    "reply overlaps protected context (ratio {overlap:.2})"
                )),
            };
        }

        ProtectedReply {
            text,
            redactions,
            truncated,
            blocked: false,
            reason: None,
        }
    }

    fn truncate(&self, reply: &str) -> (String, bool) {
        let max = self.config.max_reply_chars;
        if reply.chars().count() <= max {
            return (reply.to_string(), false);
        }
        let mut cut: String = reply.chars().take(max).collect();
        cut.push_str("\n[reply truncated]");
        (cut, true)
    }

    /// Byte ranges of every matcher hit, merged so overlaps collapse into
    /// one span.
    fn matched_spans(&self, text: &str) -> Vec<(usize, usize)> {
        let mut spans: Vec<(usize, usize)> = Vec::new();
        for re in &self.matchers {
            for m in re.find_iter(text) {
                spans.push((m.start(), m.end()));
            }
        }
        spans.sort_unstable();
        let mut merged: Vec<(usize, usize)> = Vec::new();
        for (start, end) in spans {
            match merged.last_mut() {
                Some((_, prev_end)) if start <= *prev_end => *prev_end = (*prev_end).max(end),
                _ => merged.push((start, end)),
            }
        }
        merged
    }

    fn trigram_overlap(&self, text: &str) -> f64 {
        if self.prompt_trigrams.is_empty() {
            return 0.0;
        }
        let reply_grams = word_ngrams(text, TRIGRAM);
        if reply_grams.is_empty() {
            return 0.0;
        }
        let shared = reply_grams
            .iter()
            .filter(|g| self.prompt_trigrams.contains(*g))
            .count();
        shared as f64 / reply_grams.len() as f64
    }
}

fn redact(text: &str, merged_spans: &[(usize, usize)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for &(start, end) in merged_spans {
        out.push_str(&text[cursor..start]);
        out.push_str(REDACTED);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Sliding word windows of the system prompt, skipping fragments too short
/// to be distinctive.
fn shingles(prompt: &str) -> Vec<String> {
    let words: Vec<&str> = prompt.split_whitespace().collect();
    if words.len() < SHINGLE_WORDS {
        let whole = words.join(" ");
        if whole.len() >= MIN_SHINGLE_CHARS {
            return vec![whole];
        }
        return Vec::new();
    }
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for window in words.windows(SHINGLE_WORDS) {
        let shingle = window.join(" ");
        if shingle.len() >= MIN_SHINGLE_CHARS && seen.insert(shingle.to_lowercase()) {
            out.push(shingle);
        }
    }
    out
}

fn word_ngrams(text: &str, n: usize) -> HashSet<String> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect();
    words.windows(n).map(|w| w.join(" ")).collect()
}
