//! Application-wide error types.
//!
//! Each subsystem owns a narrower error enum; `AppError` is what the binary
//! and the HTTP layer see.

use thiserror::Error;

use crate::agent::AgentError;
use crate::embeddings::EmbeddingError;
use crate::graph::GraphError;
use crate::ingest::IngestError;
use crate::llm::ProviderError;
use crate::rag::RetrievalError;
use crate::vectorstore::VectorStoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("llm error: {0}")]
    Provider(#[from] ProviderError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("server error: {0}")]
    Server(String),
}
