//! Provider abstraction.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::error::GenerateError;
use crate::session::Turn;

/// A text provider the pipeline forwards vetted inputs to.
///
/// `history` is the caller's prior delivered exchanges, oldest first.
/// Implementations do not enforce deadlines; the pipeline wraps every call
/// in its own timeout and handles the retry.
pub trait Generator: Send + Sync {
    fn generate(
        &self,
        system_prompt: &str,
        history: &[Turn],
        input: &str,
    ) -> impl Future<Output = Result<String, GenerateError>> + Send;
}

/// Scripted provider behavior for tests and local runs.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Always return this text.
    Reply(String),
    /// Echo the forwarded input back.
    Echo,
    /// Fail the first `failures` calls, then reply.
    FailThenReply { failures: u32, reply: String },
    /// Fail every call.
    AlwaysFail,
    /// Never answer; forces the pipeline deadline to fire.
    Hang,
}

/// In-process provider with scripted behavior.
#[derive(Debug)]
pub struct MockGenerator {
    behavior: MockBehavior,
    calls: AtomicU32,
}

impl MockGenerator {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicU32::new(0),
        }
    }

    pub fn reply(text: impl Into<String>) -> Self {
        Self::new(MockBehavior::Reply(text.into()))
    }

    pub fn echo() -> Self {
        Self::new(MockBehavior::Echo)
    }

    pub fn flaky(failures: u32, reply: impl Into<String>) -> Self {
        Self::new(MockBehavior::FailThenReply {
            failures,
            reply: reply.into(),
        })
    }

    pub fn hang() -> Self {
        Self::new(MockBehavior::Hang)
    }

    /// How many times `generate` has been called.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Generator for MockGenerator {
    async fn generate(
        &self,
        _system_prompt: &str,
        _history: &[Turn],
        input: &str,
    ) -> Result<String, GenerateError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            MockBehavior::Reply(text) => Ok(text.clone()),
            MockBehavior::Echo => Ok(format!("You said: {input}")),
            MockBehavior::FailThenReply { failures, reply } => {
                if call < *failures {
                    Err(GenerateError::Unavailable("transient failure".to_string()))
                } else {
                    Ok(reply.clone())
                }
            }
            MockBehavior::AlwaysFail => {
                Err(GenerateError::Unavailable("provider down".to_string()))
            }
            MockBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(86_400)).await;
                Ok(String::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flaky_recovers_after_failures() {
        let gen = MockGenerator::flaky(2, "back up");
        assert!(gen.generate("sys", &[], "hi").await.is_err());
        assert!(gen.generate("sys", &[], "hi").await.is_err());
        assert_eq!(gen.generate("sys", &[], "hi").await.unwrap(), "back up");
        assert_eq!(gen.calls(), 3);
    }

    #[tokio::test]
    async fn echo_reflects_input() {
        let gen = MockGenerator::echo();
        assert_eq!(
            gen.generate("sys", &[], "ping").await.unwrap(),
            "You said: ping"
        );
    }
}
