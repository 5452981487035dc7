//! # textgate-normalize
//!
//! Obfuscation decoding for the textgate pipeline. Attackers hide trigger
//! phrases behind URL escapes, base64, fullwidth Unicode, leetspeak and
//! invisible characters; this crate flattens those layers into a canonical
//! form that the detector can match with plain signatures.
//!
//! ## Stage order
//!
//! 1. Strip control, null and zero-width characters
//! 2. Collapse whitespace runs
//! 3. Percent-decode URL escapes
//! 4. Decode base64-looking substrings (heuristic, printable-output gated)
//! 5. NFKC Unicode normalization
//! 6. Leetspeak expansion (mixed letter/digit words only)
//! 7. Attack-keyword typo correction
//!
//! The full sequence re-runs until the text reaches a fixed point, capped
//! at a configurable pass limit, so nested encodings still come out flat
//! at bounded cost. Output growth is capped at a fixed multiple of the
//! input; a decode that would blow the cap is voided for that token and
//! the result is flagged as a decode-expansion suspect.
//!
//! The canonical text is detection-facing only. The text shown back to the
//! user is always the untouched original.

mod normalizer;
mod stages;

pub use normalizer::{NormalizedInput, Normalizer, NormalizerConfig, TransformTag};
