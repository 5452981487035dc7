//! Output-side leakage defense.
//!
//! [`OutputProtector`] scans generated replies for fragments of the
//! [`ProtectedContext`] before delivery. Literal matches are overwritten
//! with a placeholder; replies that mostly consist of protected material,
//! or that paraphrase the system prompt beyond a trigram-overlap
//! threshold, are withheld entirely. Oversize replies are truncated.

mod context;
mod protector;

pub use context::ProtectedContext;
pub use protector::{OutputProtector, ProtectedReply, ProtectorConfig, REDACTED};
