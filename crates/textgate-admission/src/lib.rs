//! # textgate-admission
//!
//! Length, token and rate admission control: the first and cheapest gate in
//! the textgate pipeline. Oversized or over-rate requests are refused here,
//! before normalization or detection spend any work on them.
//!
//! ## Checks, in order
//!
//! 1. **Character count** — O(1), against the tier's character limit.
//! 2. **Token estimate** — linear heuristic (chars / 4), no tokenizer.
//! 3. **Rate windows** — per-identity sliding 60s windows for requests and
//!    estimated tokens, both tier-scoped.
//!
//! The first failing check short-circuits; the verdict carries the failure
//! as data. Admission refusal is an expected, frequent outcome, never a
//! process error.
//!
//! ## Shared state
//!
//! [`RateWindows`] is the pipeline's only cross-request mutable state. It
//! is a `DashMap` of per-identity windows with atomic check-and-record
//! updates and TTL eviction for idle identities; everything else in this
//! crate is pure computation over its inputs.

mod guard;
mod tier;
mod window;

pub use guard::{estimate_tokens, AdmissionGuard, AdmissionVerdict, Rejection};
pub use tier::{Tier, TierLimits};
pub use window::{RateExceeded, RateWindows};
