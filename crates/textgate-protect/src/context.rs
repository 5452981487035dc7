use serde::{Deserialize, Serialize};

/// Material the backend must never leak through a generated reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProtectedContext {
    /// The system prompt handed to the provider.
    pub system_prompt: String,
    /// API keys, session secrets and similar opaque values.
    pub secret_tokens: Vec<String>,
    /// Extra phrases the operator wants scrubbed from replies.
    pub protected_phrases: Vec<String>,
}

impl ProtectedContext {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            secret_tokens: Vec::new(),
            protected_phrases: Vec::new(),
        }
    }

    pub fn with_secret(mut self, token: impl Into<String>) -> Self {
        self.secret_tokens.push(token.into());
        self
    }

    pub fn with_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.protected_phrases.push(phrase.into());
        self
    }
}
