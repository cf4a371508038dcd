//! Single-shot RAG answering: retrieve → context → one chat call.

use serde::Serialize;

use super::context::{build_context, build_prompt};
use super::retriever::{GraphStatus, RetrievalResult};
use crate::llm::{LlmProvider, ProviderError};

const ANSWER_TEMPERATURE: f32 = 0.1;

/// One cited source as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub source: String,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct Generation {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub graph_context: String,
    pub graph_status: GraphStatus,
}

pub fn sources_of(retrieval: &RetrievalResult) -> Vec<SourceRef> {
    retrieval
        .vector_results
        .iter()
        .map(|r| SourceRef { source: r.source().to_string(), score: r.score })
        .collect()
}

/// Answer `question` from an existing retrieval.
pub async fn generate(
    llm: &LlmProvider,
    question: &str,
    retrieval: RetrievalResult,
) -> Result<Generation, ProviderError> {
    let prompt = build_prompt(question, &build_context(&retrieval));
    let answer = llm.complete(&prompt, None, ANSWER_TEMPERATURE).await?;
    Ok(Generation {
        answer,
        sources: sources_of(&retrieval),
        graph_context: retrieval.graph_context,
        graph_status: retrieval.graph_status,
    })
}
