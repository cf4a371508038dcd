//! The agent's tool set.
//!
//! `Tool` is a closed enum; each variant carries the collaborator handles it
//! needs, and `invoke` is a single match. The registry is rebuilt per request
//! so graph availability follows live health.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::warn;

use crate::embeddings::EmbeddingProvider;
use crate::graph::{GraphError, GraphStore};
use crate::llm::{LlmProvider, ProviderError};
use crate::rag::{GraphStatus, RetrievalError, retrieve};
use crate::truncate_chars;
use crate::vectorstore::VectorIndex;

pub const SEARCH_DOCUMENTS: &str = "search_documents";
pub const SUMMARIZE: &str = "summarize";
pub const COMPARE_DOCUMENTS: &str = "compare_documents";
pub const QUERY_KNOWLEDGE_GRAPH: &str = "query_knowledge_graph";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[derive(Debug, Clone)]
pub enum Tool {
    SearchDocuments {
        embedder: EmbeddingProvider,
        index: VectorIndex,
        graph: Option<GraphStore>,
    },
    Summarize {
        llm: LlmProvider,
    },
    CompareDocuments {
        embedder: EmbeddingProvider,
        index: VectorIndex,
    },
    QueryKnowledgeGraph {
        graph: GraphStore,
    },
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Tool::SearchDocuments { .. } => SEARCH_DOCUMENTS,
            Tool::Summarize { .. } => SUMMARIZE,
            Tool::CompareDocuments { .. } => COMPARE_DOCUMENTS,
            Tool::QueryKnowledgeGraph { .. } => QUERY_KNOWLEDGE_GRAPH,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Tool::SearchDocuments { .. } => {
                "Search the document store for passages relevant to a query. Input: a search query string."
            }
            Tool::Summarize { .. } => "Summarize a long piece of text. Input: the text to summarize.",
            Tool::CompareDocuments { .. } => {
                "Find and compare documents on a topic. Input: a comparison query."
            }
            Tool::QueryKnowledgeGraph { .. } => {
                "Look up an entity in the knowledge graph to find related concepts. Input: entity name."
            }
        }
    }

    pub async fn invoke(&self, input: &str) -> Result<String, ToolError> {
        match self {
            Tool::SearchDocuments { embedder, index, graph } => {
                search_documents(embedder, index, graph.as_ref(), input).await
            }
            Tool::Summarize { llm } => summarize(llm, input).await,
            Tool::CompareDocuments { embedder, index } => compare_documents(embedder, index, input).await,
            Tool::QueryKnowledgeGraph { graph } => query_knowledge_graph(graph, input).await,
        }
    }
}

// ── Tool bodies ──────────────────────────────────────────────────────────────

async fn search_documents(
    embedder: &EmbeddingProvider,
    index: &VectorIndex,
    graph: Option<&GraphStore>,
    query: &str,
) -> Result<String, ToolError> {
    let result = retrieve(embedder, index, graph, query, 3).await?;
    if result.vector_results.is_empty() {
        return Ok("No relevant documents found.".to_string());
    }
    let mut parts: Vec<String> = result
        .vector_results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!("[{}] ({}, score={:.3}): {}", i + 1, r.source(), r.score, truncate_chars(&r.text, 500))
        })
        .collect();
    if !result.graph_context.is_empty() {
        parts.push(format!("\n{}", result.graph_context));
    }
    Ok(parts.join("\n\n"))
}

async fn summarize(llm: &LlmProvider, text: &str) -> Result<String, ToolError> {
    let prompt = format!("Summarize the following text concisely:\n\n{}", truncate_chars(text, 4000));
    Ok(llm.complete(&prompt, None, 0.1).await?)
}

async fn compare_documents(
    embedder: &EmbeddingProvider,
    index: &VectorIndex,
    query: &str,
) -> Result<String, ToolError> {
    let result = retrieve(embedder, index, None, query, 6).await?;
    if result.vector_results.is_empty() {
        return Ok("No documents found for comparison.".to_string());
    }
    // Group by source, keeping first-seen order.
    let mut order: Vec<&str> = Vec::new();
    let mut by_source: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for r in &result.vector_results {
        let source = r.source();
        if !by_source.contains_key(source) {
            order.push(source);
        }
        by_source.entry(source).or_default().push(truncate_chars(&r.text, 300));
    }
    let mut parts = Vec::new();
    for source in order {
        parts.push(format!("=== {source} ==="));
        parts.push(by_source.get(source).map(|t| t.join("\n")).unwrap_or_default());
        parts.push(String::new());
    }
    Ok(parts.join("\n"))
}

async fn query_knowledge_graph(graph: &GraphStore, entity: &str) -> Result<String, ToolError> {
    let neighbors = graph.neighbors(entity, 2).await?;
    if neighbors.is_empty() {
        let matches = graph.search_by_name(entity, 5).await?;
        if matches.is_empty() {
            return Ok(format!("No information found about '{entity}' in the knowledge graph."));
        }
        let names: Vec<&str> = matches.iter().map(|m| m.name.as_str()).collect();
        return Ok(format!("Related entities: {}", names.join(", ")));
    }
    let mut lines = vec![format!("Neighbors of '{entity}':")];
    for n in neighbors.iter().take(15) {
        lines.push(format!("  - {} ({}), distance={}", n.name, n.labels.join(", "), n.distance));
    }
    Ok(lines.join("\n"))
}

// ── Registry ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    graph_status: GraphStatus,
}

impl ToolRegistry {
    /// Assemble the tools for one request. The graph tool is registered only
    /// when a graph store is configured and answers a ping.
    pub async fn build(
        llm: &LlmProvider,
        embedder: &EmbeddingProvider,
        index: &VectorIndex,
        graph: Option<&GraphStore>,
    ) -> Self {
        let (graph, graph_status) = match graph {
            None => (None, GraphStatus::NotConfigured),
            Some(g) => match g.ping().await {
                Ok(()) => (Some(g.clone()), GraphStatus::Used),
                Err(e) => {
                    warn!(error = %e, "graph store unreachable, knowledge graph tool disabled");
                    (None, GraphStatus::Degraded { reason: e.to_string() })
                }
            },
        };

        let mut tools = vec![
            Tool::SearchDocuments { embedder: embedder.clone(), index: index.clone(), graph: graph.clone() },
            Tool::Summarize { llm: llm.clone() },
            Tool::CompareDocuments { embedder: embedder.clone(), index: index.clone() },
        ];
        if let Some(graph) = graph {
            tools.push(Tool::QueryKnowledgeGraph { graph });
        }
        Self { tools, graph_status }
    }

    pub fn from_tools(tools: Vec<Tool>) -> Self {
        Self { tools, graph_status: GraphStatus::NotConfigured }
    }

    /// `- name: description` lines, one per tool, for the planner prompt.
    pub fn describe(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(Tool::name).collect()
    }

    pub fn graph_status(&self) -> &GraphStatus {
        &self.graph_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Neo4jConfig;
    use crate::embeddings::hashing::HashingEmbedder;
    use crate::graph::embedded::EmbeddedGraph;
    use crate::graph::neo4j::Neo4jGraph;
    use crate::graph::{EntityKey, EntityLabel, Properties, RelationType};
    use crate::llm::providers::scripted::ScriptedProvider;
    use crate::vectorstore::{ChunkRecord, Metadata};
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        embedder: EmbeddingProvider,
        index: VectorIndex,
        graph: GraphStore,
    }

    async fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let embedder = EmbeddingProvider::Hashing(HashingEmbedder::new(128));
        let index = VectorIndex::open(&temp.path().join("v.db"), "docs", &embedder.model_key()).unwrap();
        let graph = GraphStore::Embedded(EmbeddedGraph::open(&temp.path().join("g.db")).unwrap());
        Fixture { _temp: temp, embedder, index, graph }
    }

    async fn add(f: &Fixture, id: &str, source: &str, text: &str) {
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), source.into());
        let embedding = f.embedder.embed(text).await.unwrap();
        f.index
            .upsert(vec![ChunkRecord { id: id.into(), text: text.into(), metadata, embedding }])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn registry_includes_graph_tool_when_reachable() {
        let f = fixture().await;
        let llm = LlmProvider::Scripted(ScriptedProvider::new());
        let reg = ToolRegistry::build(&llm, &f.embedder, &f.index, Some(&f.graph)).await;
        assert_eq!(reg.names(), vec![SEARCH_DOCUMENTS, SUMMARIZE, COMPARE_DOCUMENTS, QUERY_KNOWLEDGE_GRAPH]);
        assert_eq!(reg.graph_status(), &GraphStatus::Used);
        assert!(reg.describe().starts_with(
            "- search_documents: Search the document store for passages relevant to a query."
        ));

        let reg = ToolRegistry::build(&llm, &f.embedder, &f.index, None).await;
        assert!(reg.get(QUERY_KNOWLEDGE_GRAPH).is_none());
        assert_eq!(reg.graph_status(), &GraphStatus::NotConfigured);
    }

    #[tokio::test]
    async fn unreachable_graph_drops_graph_tool() {
        let f = fixture().await;
        let config = Neo4jConfig {
            uri: "http://127.0.0.1:1".into(),
            user: "neo4j".into(),
            database: "neo4j".into(),
            timeout_seconds: 1,
        };
        let dead = GraphStore::Neo4j(Neo4jGraph::new(&config, Some("pw".into())).unwrap());
        let llm = LlmProvider::Scripted(ScriptedProvider::new());

        let reg = ToolRegistry::build(&llm, &f.embedder, &f.index, Some(&dead)).await;
        assert!(reg.get(QUERY_KNOWLEDGE_GRAPH).is_none());
        assert_eq!(reg.names(), vec![SEARCH_DOCUMENTS, SUMMARIZE, COMPARE_DOCUMENTS]);
        assert!(matches!(reg.graph_status(), GraphStatus::Degraded { .. }));
        match reg.get(SEARCH_DOCUMENTS) {
            Some(Tool::SearchDocuments { graph, .. }) => assert!(graph.is_none()),
            other => panic!("unexpected search tool: {other:?}"),
        }
    }

    #[tokio::test]
    async fn search_on_empty_index() {
        let f = fixture().await;
        let tool = Tool::SearchDocuments { embedder: f.embedder.clone(), index: f.index.clone(), graph: None };
        assert_eq!(tool.invoke("anything").await.unwrap(), "No relevant documents found.");
        let tool = Tool::CompareDocuments { embedder: f.embedder.clone(), index: f.index.clone() };
        assert_eq!(tool.invoke("anything").await.unwrap(), "No documents found for comparison.");
    }

    #[tokio::test]
    async fn search_formats_results() {
        let f = fixture().await;
        add(&f, "c1", "hr.md", "Vacation policy grants 25 days.").await;
        let tool = Tool::SearchDocuments { embedder: f.embedder.clone(), index: f.index.clone(), graph: None };
        let out = tool.invoke("vacation policy").await.unwrap();
        assert!(out.starts_with("[1] (hr.md, score="), "{out}");
        assert!(out.ends_with("): Vacation policy grants 25 days."));
    }

    #[tokio::test]
    async fn compare_groups_by_source_in_order() {
        let f = fixture().await;
        add(&f, "a1", "a.md", "remote work policy text one").await;
        add(&f, "b1", "b.md", "remote work policy text two").await;
        add(&f, "a2", "a.md", "remote work policy text three").await;
        let tool = Tool::CompareDocuments { embedder: f.embedder.clone(), index: f.index.clone() };
        let out = tool.invoke("remote work policy").await.unwrap();
        assert_eq!(out.matches("=== a.md ===").count(), 1);
        assert_eq!(out.matches("=== b.md ===").count(), 1);
        assert!(out.ends_with('\n'));
    }

    #[tokio::test]
    async fn graph_tool_neighbors_and_fallbacks() {
        let f = fixture().await;
        f.graph
            .merge_relationship(
                &EntityKey::new(EntityLabel::Policy, "Access Policy"),
                &EntityKey::new(EntityLabel::System, "VPN"),
                RelationType::Governs,
                &Properties::new(),
            )
            .await
            .unwrap();
        let tool = Tool::QueryKnowledgeGraph { graph: f.graph.clone() };

        assert_eq!(
            tool.invoke("Access Policy").await.unwrap(),
            "Neighbors of 'Access Policy':\n  - VPN (System), distance=1"
        );
        assert_eq!(tool.invoke("access").await.unwrap(), "Related entities: Access Policy");
        assert_eq!(
            tool.invoke("Payroll").await.unwrap(),
            "No information found about 'Payroll' in the knowledge graph."
        );
    }

    #[tokio::test]
    async fn summarize_truncates_input() {
        let scripted = ScriptedProvider::new().reply("short");
        let tool = Tool::Summarize { llm: LlmProvider::Scripted(scripted.clone()) };
        assert_eq!(tool.invoke(&"y".repeat(5000)).await.unwrap(), "short");
        let call = &scripted.calls()[0];
        assert_eq!(call.content, format!("Summarize the following text concisely:\n\n{}", "y".repeat(4000)));
        assert_eq!(call.temperature, 0.1);
    }
}
