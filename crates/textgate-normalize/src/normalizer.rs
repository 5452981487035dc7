//! The staged normalizer and its fixed-point driver.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::stages;
use crate::stages::TypoRule;

/// A transformation the normalizer applied to reach the canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformTag {
    StripControls,
    CollapseWhitespace,
    PercentDecode,
    Base64Decode,
    Nfkc,
    LeetExpand,
    TypoCorrect,
}

impl TransformTag {
    /// Suspicion weight of this transform having fired.
    ///
    /// Decoding transforms mean the input was hiding something; cosmetic
    /// ones barely move the needle. Weights follow the original encoding
    /// scoring: stripped control bytes are the strongest signal, base64
    /// next, plain Unicode folding the weakest.
    pub fn suspicion_weight(self) -> f64 {
        match self {
            TransformTag::StripControls => 0.5,
            TransformTag::CollapseWhitespace => 0.1,
            TransformTag::PercentDecode => 0.4,
            TransformTag::Base64Decode => 0.6,
            TransformTag::Nfkc => 0.2,
            TransformTag::LeetExpand => 0.3,
            TransformTag::TypoCorrect => 0.3,
        }
    }
}

/// Canonicalized input: the original text, the detection-facing form, and
/// the transforms that produced it.
///
/// `canonical` is only ever fed to the detector; the user-visible text
/// stays `original`. Normalization is idempotent: feeding `canonical` back
/// in yields `canonical` unchanged (the driver runs to a fixed point).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedInput {
    pub original: String,
    pub canonical: String,
    pub transforms: Vec<TransformTag>,
    /// True when a decode was voided because it would have grown the text
    /// past the cap. A capped input is a decode-expansion suspect.
    pub capped: bool,
}

impl NormalizedInput {
    /// Aggregate suspicion score in `[0, 1]` from the applied transforms.
    pub fn suspicion_score(&self) -> f64 {
        let total: f64 = self
            .transforms
            .iter()
            .map(|t| t.suspicion_weight())
            .sum();
        total.min(1.0)
    }
}

/// Normalizer configuration. Every stage is independently toggleable; the
/// defaults enable all of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    pub strip_controls: bool,
    pub collapse_whitespace: bool,
    pub percent_decode: bool,
    pub base64_decode: bool,
    pub nfkc: bool,
    pub leet_expand: bool,
    pub typo_correct: bool,
    /// Maximum full-sequence passes before giving up on convergence.
    pub decode_pass_limit: usize,
    /// Canonical text may grow to at most this multiple of the input.
    pub output_growth_cap: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            strip_controls: true,
            collapse_whitespace: true,
            percent_decode: true,
            base64_decode: true,
            nfkc: true,
            leet_expand: true,
            typo_correct: true,
            decode_pass_limit: 3,
            output_growth_cap: 4,
        }
    }
}

/// Decodes layered obfuscation into a canonical, detection-facing form.
///
/// The stage sequence runs in a fixed order and is re-applied until the
/// text stops changing or the pass limit is reached, so base64 wrapped in
/// URL encoding (or base64 twice) still comes out flat. The normalizer has
/// no failure mode: it always returns a best-effort canonical text plus
/// the transforms actually applied.
#[derive(Debug)]
pub struct Normalizer {
    config: NormalizerConfig,
    base64_re: Regex,
    typo_rules: Vec<TypoRule>,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self {
            config,
            // Alphabet + minimum length + optional padding; the decode
            // itself re-validates, this only spots candidates.
            base64_re: Regex::new(r"[A-Za-z0-9+/]{20,}={0,2}").expect("base64 candidate pattern"),
            typo_rules: stages::typo_rules(),
        }
    }

    /// Canonicalize `text`.
    pub fn normalize(&self, text: &str) -> NormalizedInput {
        let cfg = &self.config;
        let max_len = text.len().saturating_mul(cfg.output_growth_cap).max(64);

        let mut canonical = text.to_string();
        let mut transforms = Vec::new();
        let mut capped = false;

        for _pass in 0..cfg.decode_pass_limit.max(1) {
            let before_pass = canonical.clone();

            let mut apply = |tag: TransformTag,
                             result: Option<String>,
                             canonical: &mut String,
                             capped: &mut bool| {
                if let Some(next) = result {
                    if next.len() > max_len {
                        *capped = true;
                    } else {
                        *canonical = next;
                        if !transforms.contains(&tag) {
                            transforms.push(tag);
                        }
                    }
                }
            };

            if cfg.strip_controls {
                apply(
                    TransformTag::StripControls,
                    stages::strip_controls(&canonical),
                    &mut canonical,
                    &mut capped,
                );
            }
            if cfg.collapse_whitespace {
                apply(
                    TransformTag::CollapseWhitespace,
                    stages::collapse_whitespace(&canonical),
                    &mut canonical,
                    &mut capped,
                );
            }
            if cfg.percent_decode {
                apply(
                    TransformTag::PercentDecode,
                    stages::percent_decode(&canonical),
                    &mut canonical,
                    &mut capped,
                );
            }
            if cfg.base64_decode {
                let (result, stage_capped) =
                    stages::decode_base64_substrings(&canonical, &self.base64_re, max_len);
                capped |= stage_capped;
                apply(
                    TransformTag::Base64Decode,
                    result,
                    &mut canonical,
                    &mut capped,
                );
            }
            if cfg.nfkc {
                apply(
                    TransformTag::Nfkc,
                    stages::nfkc(&canonical),
                    &mut canonical,
                    &mut capped,
                );
            }
            if cfg.leet_expand {
                apply(
                    TransformTag::LeetExpand,
                    stages::expand_leetspeak(&canonical),
                    &mut canonical,
                    &mut capped,
                );
            }
            if cfg.typo_correct {
                apply(
                    TransformTag::TypoCorrect,
                    stages::correct_typos(&canonical, &self.typo_rules),
                    &mut canonical,
                    &mut capped,
                );
            }

            if canonical == before_pass {
                break;
            }
        }

        NormalizedInput {
            original: text.to_string(),
            canonical,
            transforms,
            capped,
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}
