//! # textgate-signatures
//!
//! Immutable, compiled-once catalog of threat signatures for the textgate
//! request-defense pipeline.
//!
//! The bank holds categorized regex signatures, each carrying a severity
//! weight in `[0, 1]`. It is built once at process start and shared
//! read-only across all concurrent requests; the detector crate consumes it
//! to score canonical input text.
//!
//! ## Threat taxonomy
//!
//! Fifteen categories, from direct instruction override to provider-specific
//! control tokens. See [`Category`] for the full table and the fixed
//! priority ordering used to break ties between equal-weight matches.
//!
//! ## Matching guarantees
//!
//! All patterns are compiled with the `regex` crate, which has a guaranteed
//! linear-time matching engine. Keyword gaps use bounded repetition so a
//! single signature's span cannot balloon across attacker-controlled text.

mod bank;
mod category;

pub use bank::{Signature, SignatureBank, SignatureId};
pub use category::{Category, Severity};
