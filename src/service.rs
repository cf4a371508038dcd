//! Per-process collaborator bundle and the two answer modes.
//!
//! Built once from [`Config`] in `main` (or from parts in tests) and shared
//! behind an `Arc` by the HTTP layer. Every handle inside is cheap to clone.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::agent::{AgentStep, ToolRegistry, run_agent};
use crate::config::{Config, IngestConfig};
use crate::embeddings::{self, EmbeddingProvider};
use crate::error::AppError;
use crate::graph::{self, GraphStore};
use crate::ingest::{IngestReport, Pipeline};
use crate::llm::{self, LlmProvider};
use crate::rag::generator::{SourceRef, generate};
use crate::rag::retrieve;
use crate::truncate_chars;
use crate::vectorstore::VectorIndex;

/// Agent-step observations are shortened to this in query responses.
const RESPONSE_OBSERVATION_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    Rag,
    Agent,
}

impl QueryMode {
    /// `"agent"` selects the agent; anything else is single-shot RAG.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("agent") { Self::Agent } else { Self::Rag }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub mode: QueryMode,
    pub sources: Vec<SourceRef>,
    pub graph_context: String,
    pub agent_steps: Vec<AgentStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub vector_count: usize,
    pub graph_connected: bool,
}

#[derive(Debug, Clone)]
pub struct Service {
    ingest: IngestConfig,
    llm: LlmProvider,
    embedder: EmbeddingProvider,
    index: VectorIndex,
    graph: Option<GraphStore>,
}

impl Service {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let llm = llm::providers::build(&config.llm, config.llm_api_key.clone())?;
        let embedder = embeddings::build(&config.embeddings, config.embeddings_api_key.clone())?;
        let index = VectorIndex::open(
            &config.vectorstore.path,
            &config.vectorstore.collection,
            &embedder.model_key(),
        )?;
        let graph = graph::open(&config.graph, config.neo4j_password.clone())?;
        info!(
            llm = llm.name(),
            embeddings = %embedder.model_key(),
            graph = graph.as_ref().map(GraphStore::backend_name).unwrap_or("none"),
            "service ready"
        );
        Ok(Self::new(config.ingest.clone(), llm, embedder, index, graph))
    }

    pub fn new(
        ingest: IngestConfig,
        llm: LlmProvider,
        embedder: EmbeddingProvider,
        index: VectorIndex,
        graph: Option<GraphStore>,
    ) -> Self {
        Self { ingest, llm, embedder, index, graph }
    }

    pub fn graph(&self) -> Option<&GraphStore> {
        self.graph.as_ref()
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub async fn answer(&self, question: &str, mode: QueryMode, top_k: usize) -> Result<QueryAnswer, AppError> {
        info!(?mode, top_k, "answering question");
        match mode {
            QueryMode::Rag => {
                let retrieval = retrieve(&self.embedder, &self.index, self.graph(), question, top_k).await?;
                let generation = generate(&self.llm, question, retrieval).await?;
                Ok(QueryAnswer {
                    answer: generation.answer,
                    mode,
                    sources: generation.sources,
                    graph_context: generation.graph_context,
                    agent_steps: Vec::new(),
                })
            }
            QueryMode::Agent => {
                let registry = ToolRegistry::build(&self.llm, &self.embedder, &self.index, self.graph()).await;
                let run = run_agent(&self.llm, &registry, question).await?;
                let agent_steps = run
                    .steps
                    .into_iter()
                    .map(|s| AgentStep {
                        observation: truncate_chars(&s.observation, RESPONSE_OBSERVATION_CHARS).to_string(),
                        ..s
                    })
                    .collect();
                Ok(QueryAnswer {
                    answer: run.answer,
                    mode,
                    sources: Vec::new(),
                    graph_context: String::new(),
                    agent_steps,
                })
            }
        }
    }

    pub async fn ingest(&self, data_dir: Option<&Path>) -> Result<IngestReport, AppError> {
        let pipeline = Pipeline {
            config: &self.ingest,
            embedder: &self.embedder,
            index: &self.index,
            llm: &self.llm,
            graph: self.graph(),
        };
        Ok(pipeline.run(data_dir).await?)
    }

    /// Degraded when the vector index cannot be counted or a configured graph
    /// store does not answer.
    pub async fn health(&self) -> Health {
        let mut status = "ok";
        let vector_count = match self.index.count().await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "vector index health check failed");
                status = "degraded";
                0
            }
        };
        let graph_connected = match &self.graph {
            None => false,
            Some(g) => match g.ping().await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "graph health check failed");
                    status = "degraded";
                    false
                }
            },
        };
        Health { status, vector_count, graph_connected }
    }
}
