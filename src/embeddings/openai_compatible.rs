//! OpenAI-compatible embeddings client (`/v1/embeddings`), also served by
//! Ollama.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embeddings::EmbeddingError;
use crate::llm::providers::openai_compatible::check_status;

#[derive(Debug, Clone)]
pub struct OpenAiEmbeddings {
    client: Client,
    api_base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiEmbeddings {
    pub fn new(
        api_base_url: String,
        model: String,
        timeout_seconds: u64,
        api_key: Option<String>,
    ) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| EmbeddingError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, api_base_url, model, api_key })
    }

    pub fn model_key(&self) -> String {
        format!("openai:{}", self.model)
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let payload = EmbeddingRequest { model: &self.model, input: text };
        debug!(model = %self.model, text_len = text.len(), "sending embedding request");

        let mut req = self.client.post(&self.api_base_url).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let response = req.send().await.map_err(|e| {
            error!(url = %self.api_base_url, error = %e, "embedding request failed (transport)");
            EmbeddingError::Request(e.to_string())
        })?;
        let response = check_status(response).await.map_err(EmbeddingError::Request)?;

        let parsed = response
            .json::<EmbeddingResponse>()
            .await
            .map_err(|e| EmbeddingError::Request(format!("failed to parse response body: {e}")))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or(EmbeddingError::Empty)
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
