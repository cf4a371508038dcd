//! Ingestion pipeline: load → chunk → embed → upsert → extract → merge.
//!
//! Vector and graph writes are independent: a graph failure never undoes the
//! vector upsert, and one document failing extraction does not stop the rest.

pub mod chunker;
pub mod loader;

use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::IngestConfig;
use crate::embeddings::{EmbeddingError, EmbeddingProvider};
use crate::graph::GraphStore;
use crate::graph::extractor::extract_and_store;
use crate::llm::LlmProvider;
use crate::rag::GraphStatus;
use crate::vectorstore::{ChunkRecord, VectorIndex, VectorStoreError};

use chunker::{ChunkError, Strategy};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("data directory not found: {0}")]
    MissingDirectory(String),
    #[error("io error: {0}")]
    Io(String),
    #[error(transparent)]
    Chunk(#[from] ChunkError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub entities: usize,
    pub relationships: usize,
    pub rejected: usize,
    pub graph: GraphStatus,
}

impl IngestReport {
    fn empty(graph: GraphStatus) -> Self {
        Self { documents: 0, chunks: 0, entities: 0, relationships: 0, rejected: 0, graph }
    }
}

/// Borrowed collaborators for one ingestion run.
pub struct Pipeline<'a> {
    pub config: &'a IngestConfig,
    pub embedder: &'a EmbeddingProvider,
    pub index: &'a VectorIndex,
    pub llm: &'a LlmProvider,
    pub graph: Option<&'a GraphStore>,
}

impl Pipeline<'_> {
    /// Ingest every supported document under `data_dir` (the configured
    /// directory when `None`).
    pub async fn run(&self, data_dir: Option<&Path>) -> Result<IngestReport, IngestError> {
        let dir = data_dir.unwrap_or(self.config.data_dir.as_path());
        info!(dir = %dir.display(), "ingestion started");

        let documents = loader::load_directory(dir)?;
        if documents.is_empty() {
            warn!(dir = %dir.display(), "no documents found");
            return Ok(IngestReport::empty(GraphStatus::NotConfigured));
        }

        let strategy = Strategy::parse(&self.config.strategy)?;
        let chunks = chunker::chunk_documents(
            &documents,
            strategy,
            self.config.chunk_size,
            self.config.chunk_overlap,
        )?;
        info!(chunks = chunks.len(), documents = documents.len(), "chunked documents");

        let mut records = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let embedding = self.embedder.embed(&chunk.text).await?;
            records.push(ChunkRecord { id: chunk.id, text: chunk.text, metadata: chunk.metadata, embedding });
        }
        let chunk_count = records.len();
        if chunk_count > 0 {
            self.index.upsert(records).await?;
        }

        let mut report = IngestReport::empty(GraphStatus::NotConfigured);
        report.documents = documents.len();
        report.chunks = chunk_count;

        let Some(graph) = self.graph else {
            info!(?report, "ingestion complete (no graph store)");
            return Ok(report);
        };
        if let Err(e) = graph.ping().await {
            warn!(error = %e, "graph store unreachable, skipping extraction");
            report.graph = GraphStatus::Degraded { reason: e.to_string() };
            return Ok(report);
        }

        report.graph = GraphStatus::Used;
        for doc in &documents {
            match extract_and_store(self.llm, graph, &doc.content, &doc.metadata).await {
                Ok(r) => {
                    report.entities += r.entities;
                    report.relationships += r.relationships;
                    report.rejected += r.rejected;
                }
                Err(e) => {
                    let source = doc.metadata.get("source").and_then(|v| v.as_str()).unwrap_or("unknown");
                    warn!(source, error = %e, "entity extraction failed, document skipped");
                    report.graph = GraphStatus::Degraded { reason: e.to_string() };
                }
            }
        }
        info!(
            documents = report.documents,
            chunks = report.chunks,
            entities = report.entities,
            relationships = report.relationships,
            "ingestion complete"
        );
        Ok(report)
    }
}
