//! Chat provider implementations.
//!
//! `build(config, api_key)` is the factory, called once at startup.

pub mod dummy;
pub mod openai_compatible;
pub mod scripted;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ProviderError};

/// Construct an `LlmProvider` from config and an optional API key.
///
/// `api_key` comes from `LLM_API_KEY` (never TOML) and is `None` for keyless
/// local servers such as Ollama.
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider)),
        "openai" | "openai-compatible" | "ollama" => {
            let oai = &config.openai;
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                oai.api_base_url.clone(),
                oai.model.clone(),
                oai.timeout_seconds,
                api_key,
            )?;
            Ok(LlmProvider::OpenAiCompatible(p))
        }
        other => Err(ProviderError::UnknownProvider(other.to_string())),
    }
}
