//! OpenAI-compatible chat completion provider (`/v1/chat/completions`).
//!
//! Works against OpenAI, Ollama's OpenAI endpoint, LM Studio and similar
//! servers. All wire types are private to this module.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::llm::ProviderError;

// ── Public provider ───────────────────────────────────────────────────────────

/// Built once at startup and cloned freely; `reqwest::Client` is an `Arc`
/// internally.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    /// `api_key` is `None` for keyless local models; when present it is sent
    /// as `Authorization: Bearer <key>`.
    pub fn new(
        api_base_url: String,
        model: String,
        timeout_seconds: u64,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, api_base_url, model, api_key })
    }

    /// One round-trip: optional system prompt plus a single user message.
    pub async fn complete(
        &self,
        content: &str,
        system: Option<&str>,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system {
            messages.push(Message { role: "system", content: sys.to_string() });
        }
        messages.push(Message { role: "user", content: content.to_string() });

        let payload = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(temperature),
        };

        debug!(model = %payload.model, temperature, content_len = content.len(), "sending LLM request");
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full LLM request payload");
        }

        let mut req = self.client.post(&self.api_base_url).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            error!(url = %self.api_base_url, error = %e, "LLM HTTP request failed (transport)");
            ProviderError::Request(e.to_string())
        })?;
        let response = check_status(response).await.map_err(ProviderError::Request)?;

        let parsed = response.json::<ChatCompletionResponse>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize LLM response");
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })?;

        debug!(choices = parsed.choices.len(), "received LLM response");

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Request("empty or missing content in response".into()))
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// Error envelope used by OpenAI and compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Pass a successful response through; otherwise read the body and turn the
/// OpenAI error envelope (or raw body) into a message. Shared with the
/// embeddings client, which speaks the same error format.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(env) => {
            let code = env
                .error
                .code
                .map(|v| match v {
                    serde_json::Value::String(s) => format!(" [code={s}]"),
                    other => format!(" [code={other}]"),
                })
                .unwrap_or_default();
            format!("HTTP {status}{code}: {}", env.error.message)
        }
        Err(_) => format!("HTTP {status}: {body}"),
    };

    error!(%status, %message, "HTTP error from model server");
    Err(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_system_first() {
        let payload = ChatCompletionRequest {
            model: "m".into(),
            messages: vec![
                Message { role: "system", content: "s".into() },
                Message { role: "user", content: "u".into() },
            ],
            temperature: Some(0.0),
        };
        let v = serde_json::to_value(&payload).unwrap();
        assert_eq!(v["messages"][0]["role"], "system");
        assert_eq!(v["messages"][1]["content"], "u");
        assert_eq!(v["temperature"], 0.0);
    }

    #[test]
    fn response_without_content_parses() {
        let r: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap();
        assert!(r.choices[0].message.content.is_none());
    }

    #[tokio::test]
    async fn unreachable_server_is_request_error() {
        let p = OpenAiCompatibleProvider::new(
            "http://127.0.0.1:1/v1/chat/completions".into(),
            "m".into(),
            1,
            None,
        )
        .unwrap();
        let err = p.complete("hi", None, 0.0).await.unwrap_err();
        assert!(matches!(err, ProviderError::Request(_)));
    }
}
