//! Hybrid retrieval: vector nearest-neighbor search fused with graph context
//! for entities the query mentions.
//!
//! The graph half is best effort. Any graph failure leaves the vector results
//! intact, empties the graph context and is reported through
//! [`GraphStatus::Degraded`]. Embedding or vector-index failure is fatal.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::embeddings::{EmbeddingError, EmbeddingProvider};
use crate::graph::{GraphError, GraphStore};
use crate::vectorstore::{SearchResult, VectorIndex, VectorStoreError};

/// Entity names scanned for mentions in the query.
const ENTITY_SCAN_LIMIT: usize = 500;
const MATCHES_PER_ENTITY: usize = 3;
const CONTEXT_HOPS: i64 = 2;
const NEIGHBORS_PER_MATCH: usize = 10;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),
}

/// Why the graph context looks the way it does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GraphStatus {
    /// Graph context was produced.
    Used,
    /// The graph answered but nothing in it matched.
    NoMatches,
    /// No graph store is configured.
    NotConfigured,
    /// The graph store failed; results are vector-only.
    Degraded { reason: String },
}

#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub vector_results: Vec<SearchResult>,
    /// Empty when there is no graph context.
    pub graph_context: String,
    pub graph_status: GraphStatus,
}

pub async fn retrieve(
    embedder: &EmbeddingProvider,
    index: &VectorIndex,
    graph: Option<&GraphStore>,
    query: &str,
    top_k: usize,
) -> Result<RetrievalResult, RetrievalError> {
    let embedding = embedder.embed(query).await?;
    let vector_results = index.search(embedding, top_k, None).await?;
    info!(results = vector_results.len(), top_k, "vector search");

    let (graph_context, graph_status) = match graph {
        None => (String::new(), GraphStatus::NotConfigured),
        Some(graph) => match graph_context_for(graph, query).await {
            Ok(ctx) if ctx.is_empty() => (ctx, GraphStatus::NoMatches),
            Ok(ctx) => (ctx, GraphStatus::Used),
            Err(e) => {
                warn!(error = %e, "graph search failed, proceeding with vector results only");
                (String::new(), GraphStatus::Degraded { reason: e.to_string() })
            }
        },
    };

    Ok(RetrievalResult { vector_results, graph_context, graph_status })
}

/// Known entity names that occur (case-insensitively) in `query`.
pub async fn entities_in_query(graph: &GraphStore, query: &str) -> Result<Vec<String>, GraphError> {
    let query = query.to_lowercase();
    let entities = graph.list_entities(ENTITY_SCAN_LIMIT).await?;
    Ok(entities
        .into_iter()
        .map(|e| e.name)
        .filter(|name| !name.is_empty() && query.contains(&name.to_lowercase()))
        .collect())
}

/// Render `'X' is related to: ...` lines under a `Knowledge Graph Context:`
/// header; empty when no mentioned entity has neighbors.
pub async fn graph_context_for(graph: &GraphStore, query: &str) -> Result<String, GraphError> {
    let mentioned = entities_in_query(graph, query).await?;
    if mentioned.is_empty() {
        return Ok(String::new());
    }

    let mut lines = Vec::new();
    for entity in &mentioned {
        for found in graph.search_by_name(entity, MATCHES_PER_ENTITY).await? {
            let neighbors = graph.neighbors(&found.name, CONTEXT_HOPS).await?;
            if neighbors.is_empty() {
                continue;
            }
            let related: Vec<String> = neighbors
                .iter()
                .take(NEIGHBORS_PER_MATCH)
                .map(|n| format!("{} ({})", n.name, n.labels.join(", ")))
                .collect();
            lines.push(format!("'{}' is related to: {}", found.name, related.join(", ")));
        }
    }
    debug!(entities = mentioned.len(), lines = lines.len(), "graph context");

    if lines.is_empty() {
        return Ok(String::new());
    }
    Ok(format!("Knowledge Graph Context:\n{}", lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::hashing::HashingEmbedder;
    use crate::graph::embedded::EmbeddedGraph;
    use crate::graph::{EntityKey, EntityLabel, Properties, RelationType};
    use crate::vectorstore::{ChunkRecord, Metadata};
    use tempfile::TempDir;

    async fn seeded_index(temp: &TempDir, embedder: &EmbeddingProvider) -> VectorIndex {
        let index = VectorIndex::open(&temp.path().join("v.db"), "docs", &embedder.model_key()).unwrap();
        let mut records = Vec::new();
        for (id, text) in [("c1", "Payroll data is retained for seven years."), ("c2", "Office plants need water.")] {
            let mut meta = Metadata::new();
            meta.insert("source".into(), format!("{id}.md").into());
            records.push(ChunkRecord {
                id: id.into(),
                text: text.into(),
                metadata: meta,
                embedding: embedder.embed(text).await.unwrap(),
            });
        }
        index.upsert(records).await.unwrap();
        index
    }

    #[tokio::test]
    async fn graph_context_for_mentioned_entity() {
        let temp = TempDir::new().unwrap();
        let embedder = EmbeddingProvider::Hashing(HashingEmbedder::new(128));
        let index = seeded_index(&temp, &embedder).await;
        let graph = GraphStore::Embedded(EmbeddedGraph::open(&temp.path().join("g.db")).unwrap());
        graph
            .merge_relationship(
                &EntityKey::new(EntityLabel::System, "Payroll"),
                &EntityKey::new(EntityLabel::Policy, "Retention Policy"),
                RelationType::Governs,
                &Properties::new(),
            )
            .await
            .unwrap();

        let r = retrieve(&embedder, &index, Some(&graph), "How long is payroll data kept?", 2).await.unwrap();
        assert_eq!(r.vector_results.len(), 2);
        assert_eq!(r.vector_results[0].id, "c1");
        assert_eq!(r.graph_status, GraphStatus::Used);
        assert_eq!(
            r.graph_context,
            "Knowledge Graph Context:\n'Payroll' is related to: Retention Policy (Policy)"
        );
    }

    #[tokio::test]
    async fn no_graph_means_not_configured() {
        let temp = TempDir::new().unwrap();
        let embedder = EmbeddingProvider::Hashing(HashingEmbedder::new(128));
        let index = seeded_index(&temp, &embedder).await;
        let r = retrieve(&embedder, &index, None, "payroll", 1).await.unwrap();
        assert_eq!(r.vector_results.len(), 1);
        assert!(r.graph_context.is_empty());
        assert_eq!(r.graph_status, GraphStatus::NotConfigured);
    }

    #[tokio::test]
    async fn unmentioned_entities_yield_no_matches() {
        let temp = TempDir::new().unwrap();
        let embedder = EmbeddingProvider::Hashing(HashingEmbedder::new(128));
        let index = seeded_index(&temp, &embedder).await;
        let graph = GraphStore::Embedded(EmbeddedGraph::open(&temp.path().join("g.db")).unwrap());
        graph
            .merge_entity(&EntityKey::new(EntityLabel::Concept, "Kubernetes"), &Properties::new())
            .await
            .unwrap();
        let r = retrieve(&embedder, &index, Some(&graph), "office plants", 1).await.unwrap();
        assert_eq!(r.graph_status, GraphStatus::NoMatches);
        assert!(r.graph_context.is_empty());
    }
}
