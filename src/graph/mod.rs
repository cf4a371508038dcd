//! Knowledge graph: typed vocabulary, traversal engine and storage backends.
//!
//! `GraphStore` is an enum over two backends with the same operations:
//!
//! - **Embedded**: SQLite tables walked hop by hop in SQL; zero setup.
//! - **Neo4j**: Cypher over the Neo4j HTTP transaction endpoint.
//!
//! Entity labels and relationship types are closed enums. Unknown values are
//! rejected at the edges (`FromStr`), and backends still pass every schema
//! token through [`sanitize::sanitize`] before it is interpolated into a query.
//!
//! Traversal is bounded: hops are clamped to `1..=MAX_HOPS`, subgraph node and
//! edge counts to `MAX_NODE_LIMIT` / `MAX_EDGE_LIMIT`, entity listings to
//! `MAX_ENTITY_LIMIT`. A missing entity yields
//! an empty result, never an error; errors mean the store itself failed.

pub mod embedded;
pub mod extractor;
pub mod neo4j;
pub mod sanitize;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::config::{GraphBackend, GraphConfig};

pub const MAX_HOPS: usize = 4;
pub const MAX_NODE_LIMIT: usize = 1000;
pub const MAX_EDGE_LIMIT: usize = 2000;
pub const MAX_ENTITY_LIMIT: usize = 1000;

/// Scalar properties attached to nodes and edges.
pub type Properties = serde_json::Map<String, serde_json::Value>;

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum GraphError {
    /// Transport, auth or storage failure: the store could not be reached or used.
    #[error("graph store unavailable: {0}")]
    Unavailable(String),
    /// The store answered but rejected the statement.
    #[error("graph query failed: {0}")]
    Query(String),
    /// The store answered with something we could not decode.
    #[error("graph response decode failed: {0}")]
    Decode(String),
    #[error("unknown entity label: '{0}'")]
    UnknownLabel(String),
    #[error("unknown relationship type: '{0}'")]
    UnknownRelation(String),
}

// ── Vocabulary ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityLabel {
    Person,
    Organization,
    Policy,
    System,
    Technology,
    Concept,
    Process,
    Document,
}

impl EntityLabel {
    pub const ALL: [EntityLabel; 8] = [
        EntityLabel::Person,
        EntityLabel::Organization,
        EntityLabel::Policy,
        EntityLabel::System,
        EntityLabel::Technology,
        EntityLabel::Concept,
        EntityLabel::Process,
        EntityLabel::Document,
    ];

    pub const NAMES: [&'static str; 8] = [
        "Person",
        "Organization",
        "Policy",
        "System",
        "Technology",
        "Concept",
        "Process",
        "Document",
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityLabel::Person => "Person",
            EntityLabel::Organization => "Organization",
            EntityLabel::Policy => "Policy",
            EntityLabel::System => "System",
            EntityLabel::Technology => "Technology",
            EntityLabel::Concept => "Concept",
            EntityLabel::Process => "Process",
            EntityLabel::Document => "Document",
        }
    }

    /// Guarded schema token for query interpolation.
    pub fn schema_token(self) -> String {
        sanitize::sanitize(self.as_str(), EntityLabel::Concept.as_str(), Some(Self::NAMES.as_slice()))
    }
}

impl FromStr for EntityLabel {
    type Err = GraphError;

    /// Case-insensitive match on the normalized name; anything else is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace(' ', "_");
        EntityLabel::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| GraphError::UnknownLabel(s.to_string()))
    }
}

impl fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationType {
    RelatesTo,
    PartOf,
    Governs,
    Uses,
    DependsOn,
    Defines,
    Mentions,
}

impl RelationType {
    pub const ALL: [RelationType; 7] = [
        RelationType::RelatesTo,
        RelationType::PartOf,
        RelationType::Governs,
        RelationType::Uses,
        RelationType::DependsOn,
        RelationType::Defines,
        RelationType::Mentions,
    ];

    pub const NAMES: [&'static str; 7] =
        ["RELATES_TO", "PART_OF", "GOVERNS", "USES", "DEPENDS_ON", "DEFINES", "MENTIONS"];

    pub fn as_str(self) -> &'static str {
        match self {
            RelationType::RelatesTo => "RELATES_TO",
            RelationType::PartOf => "PART_OF",
            RelationType::Governs => "GOVERNS",
            RelationType::Uses => "USES",
            RelationType::DependsOn => "DEPENDS_ON",
            RelationType::Defines => "DEFINES",
            RelationType::Mentions => "MENTIONS",
        }
    }

    pub fn schema_token(self) -> String {
        sanitize::sanitize(self.as_str(), RelationType::RelatesTo.as_str(), Some(Self::NAMES.as_slice()))
    }
}

impl FromStr for RelationType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace(' ', "_").to_ascii_uppercase();
        RelationType::ALL
            .into_iter()
            .find(|r| r.as_str() == normalized)
            .ok_or_else(|| GraphError::UnknownRelation(s.to_string()))
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Records ──────────────────────────────────────────────────────────────────

/// A node's identity for merge operations: (label, name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub label: EntityLabel,
    pub name: String,
}

impl EntityKey {
    pub fn new(label: EntityLabel, name: impl Into<String>) -> Self {
        Self { label, name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRef {
    pub name: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub name: String,
    pub labels: Vec<String>,
    pub distance: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub rel_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Subgraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl Subgraph {
    /// Empty node and edge lists: the start entity does not exist.
    pub fn is_not_found(&self) -> bool {
        self.nodes.is_empty()
    }
}

// ── Bounds ───────────────────────────────────────────────────────────────────

/// Subgraph request bounds after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubgraphLimits {
    pub max_hops: usize,
    pub node_limit: usize,
    pub edge_limit: usize,
}

impl SubgraphLimits {
    pub fn clamped(max_hops: i64, node_limit: i64, edge_limit: i64) -> Self {
        Self {
            max_hops: clamp_hops(max_hops),
            node_limit: node_limit.clamp(1, MAX_NODE_LIMIT as i64) as usize,
            edge_limit: edge_limit.clamp(1, MAX_EDGE_LIMIT as i64) as usize,
        }
    }
}

pub fn clamp_hops(max_hops: i64) -> usize {
    max_hops.clamp(1, MAX_HOPS as i64) as usize
}

pub fn clamp_entity_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_ENTITY_LIMIT)
}

/// Build the final subgraph from a raw traversal.
///
/// Nodes and edges are deduplicated by id (first occurrence wins) and capped
/// independently. The start node is always present exactly once: when the
/// traversal found nothing the result is `[start]` with no edges; when the cap
/// dropped it, it is inserted first and the tail is trimmed back to the cap.
pub fn assemble_subgraph(
    start: GraphNode,
    raw_nodes: Vec<GraphNode>,
    raw_edges: Vec<GraphEdge>,
    limits: SubgraphLimits,
) -> Subgraph {
    if raw_nodes.is_empty() {
        return Subgraph { nodes: vec![start], edges: Vec::new() };
    }

    let mut seen = HashSet::new();
    let mut nodes: Vec<GraphNode> = raw_nodes
        .into_iter()
        .filter(|n| seen.insert(n.id.clone()))
        .take(limits.node_limit)
        .collect();

    if !nodes.iter().any(|n| n.id == start.id) {
        nodes.insert(0, start);
        nodes.truncate(limits.node_limit);
    }

    let mut seen = HashSet::new();
    let edges = raw_edges
        .into_iter()
        .filter(|e| seen.insert(e.id.clone()))
        .take(limits.edge_limit)
        .collect();

    Subgraph { nodes, edges }
}

// ── Store ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum GraphStore {
    Embedded(embedded::EmbeddedGraph),
    Neo4j(neo4j::Neo4jGraph),
}

impl GraphStore {
    pub fn backend_name(&self) -> &'static str {
        match self {
            GraphStore::Embedded(_) => "embedded",
            GraphStore::Neo4j(_) => "neo4j",
        }
    }

    /// Cheap reachability check.
    pub async fn ping(&self) -> Result<(), GraphError> {
        match self {
            GraphStore::Embedded(g) => g.ping().await,
            GraphStore::Neo4j(g) => g.ping().await,
        }
    }

    /// Create the node if absent, otherwise merge `properties` into it.
    pub async fn merge_entity(&self, key: &EntityKey, properties: &Properties) -> Result<(), GraphError> {
        match self {
            GraphStore::Embedded(g) => g.merge_entity(key, properties).await,
            GraphStore::Neo4j(g) => g.merge_entity(key, properties).await,
        }
    }

    /// Merge both endpoints and the directed edge in one operation.
    /// Identical (from, to, type) triples are stored once.
    pub async fn merge_relationship(
        &self,
        from: &EntityKey,
        to: &EntityKey,
        rel_type: RelationType,
        properties: &Properties,
    ) -> Result<(), GraphError> {
        match self {
            GraphStore::Embedded(g) => g.merge_relationship(from, to, rel_type, properties).await,
            GraphStore::Neo4j(g) => g.merge_relationship(from, to, rel_type, properties).await,
        }
    }

    /// Entities within `max_hops` undirected hops (clamped to `1..=4`), one
    /// entry per neighbor node at its shortest distance, ordered by distance
    /// then name. Nodes sharing the start's name are not neighbors.
    pub async fn neighbors(&self, name: &str, max_hops: i64) -> Result<Vec<Neighbor>, GraphError> {
        let hops = clamp_hops(max_hops);
        match self {
            GraphStore::Embedded(g) => g.neighbors(name, hops).await,
            GraphStore::Neo4j(g) => g.neighbors(name, hops).await,
        }
    }

    /// Case-insensitive substring match on entity names, at most `limit`.
    pub async fn search_by_name(&self, query: &str, limit: usize) -> Result<Vec<EntityRef>, GraphError> {
        match self {
            GraphStore::Embedded(g) => g.search_by_name(query, limit).await,
            GraphStore::Neo4j(g) => g.search_by_name(query, limit).await,
        }
    }

    /// Up to `limit` entities, clamped to `1..=MAX_ENTITY_LIMIT`.
    pub async fn list_entities(&self, limit: usize) -> Result<Vec<EntityRef>, GraphError> {
        let limit = clamp_entity_limit(limit);
        match self {
            GraphStore::Embedded(g) => g.list_entities(limit).await,
            GraphStore::Neo4j(g) => g.list_entities(limit).await,
        }
    }

    /// Bounded subgraph around `name`. Empty when the entity does not exist.
    pub async fn subgraph(
        &self,
        name: &str,
        max_hops: i64,
        node_limit: i64,
        edge_limit: i64,
    ) -> Result<Subgraph, GraphError> {
        let limits = SubgraphLimits::clamped(max_hops, node_limit, edge_limit);
        match self {
            GraphStore::Embedded(g) => g.subgraph(name, limits).await,
            GraphStore::Neo4j(g) => g.subgraph(name, limits).await,
        }
    }

    /// Delete every entity and relationship. No undo.
    pub async fn clear(&self) -> Result<(), GraphError> {
        match self {
            GraphStore::Embedded(g) => g.clear().await,
            GraphStore::Neo4j(g) => g.clear().await,
        }
    }
}

/// Open the configured backend, or `None` when the graph is disabled.
///
/// Opening does not contact a remote server; callers `ping` per request so
/// availability tracks live health.
pub fn open(config: &GraphConfig, neo4j_password: Option<String>) -> Result<Option<GraphStore>, GraphError> {
    let store = match config.backend {
        GraphBackend::None => return Ok(None),
        GraphBackend::Embedded => GraphStore::Embedded(embedded::EmbeddedGraph::open(&config.embedded.path)?),
        GraphBackend::Neo4j => GraphStore::Neo4j(neo4j::Neo4jGraph::new(&config.neo4j, neo4j_password)?),
    };
    info!(backend = store.backend_name(), "graph store opened");
    Ok(Some(store))
}
