//! Embedding provider abstraction: one text in, one vector out.
//!
//! Same shape as the chat providers: an enum over backends with a single
//! async `embed` and a `build` factory.

pub mod hashing;
pub mod openai_compatible;

use thiserror::Error;

use crate::config::EmbeddingsConfig;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("unknown embedding provider: {0}")]
    UnknownProvider(String),
    #[error("embedding request failed: {0}")]
    Request(String),
    #[error("embedding response was empty")]
    Empty,
}

#[derive(Debug, Clone)]
pub enum EmbeddingProvider {
    Hashing(hashing::HashingEmbedder),
    OpenAiCompatible(openai_compatible::OpenAiEmbeddings),
}

impl EmbeddingProvider {
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        match self {
            EmbeddingProvider::Hashing(e) => Ok(e.embed(text)),
            EmbeddingProvider::OpenAiCompatible(e) => e.embed(text).await,
        }
    }

    /// Identifies the vector space; stored alongside vectors so a model
    /// switch is detectable.
    pub fn model_key(&self) -> String {
        match self {
            EmbeddingProvider::Hashing(e) => e.model_key(),
            EmbeddingProvider::OpenAiCompatible(e) => e.model_key(),
        }
    }
}

/// Construct the configured provider. `api_key` comes from the environment.
pub fn build(config: &EmbeddingsConfig, api_key: Option<String>) -> Result<EmbeddingProvider, EmbeddingError> {
    match config.provider.as_str() {
        "hashing" | "local" => Ok(EmbeddingProvider::Hashing(hashing::HashingEmbedder::new(
            config.hashing.dimensions,
        ))),
        "openai" | "openai-compatible" | "ollama" => {
            let e = openai_compatible::OpenAiEmbeddings::new(
                config.openai.api_base_url.clone(),
                config.openai.model.clone(),
                config.openai.timeout_seconds,
                api_key,
            )?;
            Ok(EmbeddingProvider::OpenAiCompatible(e))
        }
        other => Err(EmbeddingError::UnknownProvider(other.to_string())),
    }
}

/// Cosine distance in `[0, 2]`; zero-norm or mismatched inputs are maximally
/// distant.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 2.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 2.0;
    }
    (1.0 - dot / denom).clamp(0.0, 2.0)
}
