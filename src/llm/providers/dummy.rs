//! Dummy provider: echoes the user message back prefixed with `[echo]`.
//! Lets the whole pipeline run without a model server.

use crate::llm::ProviderError;

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn complete(&self, content: &str, _system: Option<&str>) -> Result<String, ProviderError> {
        Ok(format!("[echo] {content}"))
    }
}
