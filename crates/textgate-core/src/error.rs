//! Error types for pipeline operations.

use thiserror::Error;

/// Failure reported by a text provider.
///
/// Timeouts are not represented here: the pipeline owns the deadline and
/// applies it from the outside, so providers only report failures they can
/// observe themselves.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The provider could not be reached or refused the connection.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The provider answered but the response was unusable.
    #[error("provider returned malformed output: {0}")]
    Malformed(String),
}
