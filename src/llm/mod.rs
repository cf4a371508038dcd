//! Chat/completion provider abstraction.
//!
//! `LlmProvider` is an enum over concrete backends. Adding a backend means a
//! new module in `providers/`, a new variant and a new `complete` arm.
//!
//! Providers are shared immutable capabilities; clone them freely. Every call
//! carries its own temperature: planning and extraction run at 0.0, answer
//! synthesis and summarization slightly above.

pub mod providers;

use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider request failed: {0}")]
    Request(String),
}

// ── Provider enum ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
    Scripted(providers::scripted::ScriptedProvider),
}

impl LlmProvider {
    /// Send `content` as the user message (with an optional system prompt)
    /// and return the reply text.
    pub async fn complete(
        &self,
        content: &str,
        system: Option<&str>,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.complete(content, system).await,
            LlmProvider::OpenAiCompatible(p) => p.complete(content, system, temperature).await,
            LlmProvider::Scripted(p) => p.complete(content, system, temperature),
        }
    }

    /// Short backend name for logs and health output.
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Dummy(_) => "dummy",
            LlmProvider::OpenAiCompatible(_) => "openai",
            LlmProvider::Scripted(_) => "scripted",
        }
    }
}

/// Slice from the first `{` to the last `}`: models often wrap JSON in
/// prose or code fences. `None` when there is no such span.
pub fn json_object_span(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}
