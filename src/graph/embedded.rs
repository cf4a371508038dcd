//! Embedded graph backend on SQLite.
//!
//! Nodes are unique per (label, name); edges are unique per (from, to, type).
//! Traversal is an undirected BFS driven from SQL one hop at a time: each
//! round reads only the edges touching the current frontier, and only the
//! node rows that can appear in the result are loaded. `distance` is always
//! the shortest hop count.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, Transaction, params};
use tracing::debug;

use super::{
    EntityKey, EntityRef, GraphEdge, GraphError, GraphNode, Neighbor, Properties, RelationType,
    Subgraph, SubgraphLimits, assemble_subgraph,
};

const SCHEMA_VERSION: i64 = 2;

#[derive(Debug, Clone)]
pub struct EmbeddedGraph {
    db_path: PathBuf,
}

struct NodeRow {
    id: i64,
    label: String,
    name: String,
}

impl NodeRow {
    fn into_graph_node(self) -> GraphNode {
        GraphNode { id: self.id.to_string(), name: self.name, labels: vec![self.label] }
    }
}

impl EmbeddedGraph {
    /// Open (or create) the graph database. Safe to call repeatedly.
    pub fn open(db_path: &Path) -> Result<Self, GraphError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                GraphError::Unavailable(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let graph = Self { db_path: db_path.to_path_buf() };
        graph.init_db()?;
        Ok(graph)
    }

    // ── Async API (blocking pool) ─────────────────────────────────────────

    pub async fn ping(&self) -> Result<(), GraphError> {
        self.run(|g| g.open_conn().map(|_| ())).await
    }

    pub async fn merge_entity(&self, key: &EntityKey, properties: &Properties) -> Result<(), GraphError> {
        let (key, properties) = (key.clone(), properties.clone());
        self.run(move |g| g.merge_entity_blocking(&key, &properties)).await
    }

    pub async fn merge_relationship(
        &self,
        from: &EntityKey,
        to: &EntityKey,
        rel_type: RelationType,
        properties: &Properties,
    ) -> Result<(), GraphError> {
        let (from, to, properties) = (from.clone(), to.clone(), properties.clone());
        self.run(move |g| g.merge_relationship_blocking(&from, &to, rel_type, &properties))
            .await
    }

    pub async fn neighbors(&self, name: &str, hops: usize) -> Result<Vec<Neighbor>, GraphError> {
        let name = name.to_string();
        self.run(move |g| g.neighbors_blocking(&name, hops)).await
    }

    pub async fn search_by_name(&self, query: &str, limit: usize) -> Result<Vec<EntityRef>, GraphError> {
        let query = query.to_string();
        self.run(move |g| g.search_by_name_blocking(&query, limit)).await
    }

    pub async fn list_entities(&self, limit: usize) -> Result<Vec<EntityRef>, GraphError> {
        self.run(move |g| g.list_entities_blocking(limit)).await
    }

    pub async fn subgraph(&self, name: &str, limits: SubgraphLimits) -> Result<Subgraph, GraphError> {
        let name = name.to_string();
        self.run(move |g| g.subgraph_blocking(&name, limits)).await
    }

    pub async fn clear(&self) -> Result<(), GraphError> {
        self.run(|g| g.clear_blocking()).await
    }

    async fn run<T, F>(&self, f: F) -> Result<T, GraphError>
    where
        T: Send + 'static,
        F: FnOnce(&EmbeddedGraph) -> Result<T, GraphError> + Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || f(&this))
            .await
            .map_err(|e| GraphError::Unavailable(format!("graph task join: {e}")))?
    }

    // ── Mutation ──────────────────────────────────────────────────────────

    fn merge_entity_blocking(&self, key: &EntityKey, properties: &Properties) -> Result<(), GraphError> {
        let mut conn = self.open_conn()?;
        let tx = conn.transaction().map_err(unavailable("begin merge_entity tx"))?;
        upsert_node(&tx, key, properties)?;
        tx.commit().map_err(unavailable("commit merge_entity"))
    }

    fn merge_relationship_blocking(
        &self,
        from: &EntityKey,
        to: &EntityKey,
        rel_type: RelationType,
        properties: &Properties,
    ) -> Result<(), GraphError> {
        let empty = Properties::new();
        let props = encode_properties(properties)?;
        let mut conn = self.open_conn()?;
        let tx = conn.transaction().map_err(unavailable("begin merge_relationship tx"))?;
        let from_id = upsert_node(&tx, from, &empty)?;
        let to_id = upsert_node(&tx, to, &empty)?;
        tx.execute(
            "INSERT INTO edges (from_id, to_id, rel_type, properties) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(from_id, to_id, rel_type)
             DO UPDATE SET properties = json_patch(edges.properties, excluded.properties)",
            params![from_id, to_id, rel_type.schema_token(), props],
        )
        .map_err(query("merge edge"))?;
        tx.commit().map_err(unavailable("commit merge_relationship"))
    }

    fn clear_blocking(&self) -> Result<(), GraphError> {
        let conn = self.open_conn()?;
        conn.execute_batch("DELETE FROM edges; DELETE FROM nodes;")
            .map_err(query("clear"))
    }

    // ── Lookup ────────────────────────────────────────────────────────────

    fn search_by_name_blocking(&self, needle: &str, limit: usize) -> Result<Vec<EntityRef>, GraphError> {
        let needle = needle.to_lowercase();
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare("SELECT name, label FROM nodes ORDER BY id")
            .map_err(query("prepare search_by_name"))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(query("search_by_name"))?;
        let mut out = Vec::new();
        for row in rows {
            if out.len() >= limit {
                break;
            }
            let (name, label) = row.map_err(query("search_by_name row"))?;
            if name.to_lowercase().contains(&needle) {
                out.push(EntityRef { name, labels: vec![label] });
            }
        }
        Ok(out)
    }

    fn list_entities_blocking(&self, limit: usize) -> Result<Vec<EntityRef>, GraphError> {
        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare("SELECT name, label FROM nodes ORDER BY id LIMIT ?1")
            .map_err(query("prepare list_entities"))?;
        let rows = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
                Ok(EntityRef { name: row.get(0)?, labels: vec![row.get(1)?] })
            })
            .map_err(query("list_entities"))?;
        rows.map(|r| r.map_err(query("list_entities row"))).collect()
    }

    // ── Traversal ─────────────────────────────────────────────────────────

    fn neighbors_blocking(&self, name: &str, hops: usize) -> Result<Vec<Neighbor>, GraphError> {
        let conn = self.open_conn()?;
        let starts = node_ids_named(&conn, name)?;
        if starts.is_empty() {
            return Ok(Vec::new());
        }
        let distances = expand(&conn, &starts, hops)?;
        let reached: Vec<i64> = distances.iter().filter(|(_, d)| **d > 0).map(|(id, _)| *id).collect();

        // One entry per node: a name shared by two labels yields two neighbors.
        let mut rows: Vec<(usize, NodeRow)> = load_nodes(&conn, &reached)?
            .into_iter()
            .filter_map(|n| distances.get(&n.id).map(|d| (*d, n)))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)).then(a.1.id.cmp(&b.1.id)));
        Ok(rows
            .into_iter()
            .map(|(d, n)| Neighbor { name: n.name, labels: vec![n.label], distance: d as u32 })
            .collect())
    }

    fn subgraph_blocking(&self, name: &str, limits: SubgraphLimits) -> Result<Subgraph, GraphError> {
        let conn = self.open_conn()?;
        let start: Option<NodeRow> = conn
            .query_row(
                "SELECT id, label, name FROM nodes WHERE name = ?1 ORDER BY id LIMIT 1",
                params![name],
                |row| Ok(NodeRow { id: row.get(0)?, label: row.get(1)?, name: row.get(2)? }),
            )
            .optional()
            .map_err(query("find start node"))?;
        let Some(start) = start else {
            return Ok(Subgraph::default());
        };

        let distances = expand(&conn, &[start.id], limits.max_hops)?;
        if distances.len() <= 1 {
            return Ok(assemble_subgraph(start.into_graph_node(), Vec::new(), Vec::new(), limits));
        }

        let mut ordered: Vec<(usize, i64)> = distances.iter().map(|(id, d)| (*d, *id)).collect();
        ordered.sort_unstable();

        // The start sorts first, so the node cap never needs rows past it.
        let kept: Vec<i64> = ordered.iter().take(limits.node_limit).map(|(_, id)| *id).collect();
        let mut by_id: HashMap<i64, NodeRow> =
            load_nodes(&conn, &kept)?.into_iter().map(|n| (n.id, n)).collect();
        let raw_nodes: Vec<GraphNode> = kept
            .iter()
            .filter_map(|id| by_id.remove(id))
            .map(NodeRow::into_graph_node)
            .collect();

        // An edge lies on a path of length <= max_hops from the start iff one
        // endpoint is strictly closer than max_hops; the other end is then
        // within reach as well.
        let inner: Vec<i64> =
            ordered.iter().filter(|(d, _)| *d < limits.max_hops).map(|(_, id)| *id).collect();
        let raw_edges: Vec<GraphEdge> = edges_touching(&conn, &inner, limits.edge_limit)?
            .into_iter()
            .map(|e| GraphEdge {
                id: e.id.to_string(),
                source: e.from_id.to_string(),
                target: e.to_id.to_string(),
                rel_type: e.rel_type,
            })
            .collect();

        let subgraph = assemble_subgraph(start.into_graph_node(), raw_nodes, raw_edges, limits);
        debug!(
            entity = name,
            reached = distances.len(),
            nodes = subgraph.nodes.len(),
            edges = subgraph.edges.len(),
            "embedded subgraph"
        );
        Ok(subgraph)
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn open_conn(&self) -> Result<Connection, GraphError> {
        let conn = Connection::open(&self.db_path).map_err(|e| {
            GraphError::Unavailable(format!("open {}: {e}", self.db_path.display()))
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(unavailable("set journal_mode WAL"))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(unavailable("set foreign_keys ON"))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(unavailable("set busy_timeout"))?;
        Ok(conn)
    }

    fn init_db(&self) -> Result<(), GraphError> {
        let conn = self.open_conn()?;
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(unavailable("read schema version"))?;
        if version >= SCHEMA_VERSION {
            return Ok(());
        }
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS nodes (
                id INTEGER PRIMARY KEY,
                label TEXT NOT NULL,
                name TEXT NOT NULL,
                properties TEXT NOT NULL DEFAULT '{}',
                UNIQUE (label, name)
            );
            CREATE INDEX IF NOT EXISTS nodes_name ON nodes (name);

            CREATE TABLE IF NOT EXISTS edges (
                id INTEGER PRIMARY KEY,
                from_id INTEGER NOT NULL REFERENCES nodes (id) ON DELETE CASCADE,
                to_id INTEGER NOT NULL REFERENCES nodes (id) ON DELETE CASCADE,
                rel_type TEXT NOT NULL,
                properties TEXT NOT NULL DEFAULT '{}',
                UNIQUE (from_id, to_id, rel_type)
            );
            CREATE INDEX IF NOT EXISTS edges_to ON edges (to_id);

            PRAGMA user_version = 2;
            ",
        )
        .map_err(unavailable("initialize schema"))
    }
}

struct EdgeRow {
    id: i64,
    from_id: i64,
    to_id: i64,
    rel_type: String,
}

/// Insert the node if missing, merge properties if present; returns its id.
fn upsert_node(tx: &Transaction<'_>, key: &EntityKey, properties: &Properties) -> Result<i64, GraphError> {
    let props = encode_properties(properties)?;
    tx.execute(
        "INSERT INTO nodes (label, name, properties) VALUES (?1, ?2, ?3)
         ON CONFLICT(label, name) DO UPDATE SET properties = json_patch(nodes.properties, excluded.properties)",
        params![key.label.schema_token(), key.name, props],
    )
    .map_err(query("merge node"))?;
    tx.query_row(
        "SELECT id FROM nodes WHERE label = ?1 AND name = ?2",
        params![key.label.schema_token(), key.name],
        |row| row.get(0),
    )
    .map_err(query("read node id"))
}

fn encode_properties(properties: &Properties) -> Result<String, GraphError> {
    serde_json::to_string(properties).map_err(|e| GraphError::Query(format!("serialize properties: {e}")))
}

/// Id list bound as one JSON array parameter and unpacked with `json_each`.
fn id_list(ids: &[i64]) -> Result<String, GraphError> {
    serde_json::to_string(ids).map_err(|e| GraphError::Query(format!("encode id list: {e}")))
}

fn node_ids_named(conn: &Connection, name: &str) -> Result<Vec<i64>, GraphError> {
    let mut stmt = conn
        .prepare("SELECT id FROM nodes WHERE name = ?1 ORDER BY id")
        .map_err(query("prepare start nodes"))?;
    let rows = stmt.query_map(params![name], |row| row.get(0)).map_err(query("start nodes"))?;
    rows.map(|r| r.map_err(query("start node row"))).collect()
}

fn load_nodes(conn: &Connection, ids: &[i64]) -> Result<Vec<NodeRow>, GraphError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut stmt = conn
        .prepare("SELECT id, label, name FROM nodes WHERE id IN (SELECT value FROM json_each(?1))")
        .map_err(query("prepare load nodes"))?;
    let rows = stmt
        .query_map(params![id_list(ids)?], |row| {
            Ok(NodeRow { id: row.get(0)?, label: row.get(1)?, name: row.get(2)? })
        })
        .map_err(query("load nodes"))?;
    rows.map(|r| r.map_err(query("load nodes row"))).collect()
}

/// Edges with either endpoint in `ids`, lowest id first, at most `limit`.
fn edges_touching(conn: &Connection, ids: &[i64], limit: usize) -> Result<Vec<EdgeRow>, GraphError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut stmt = conn
        .prepare(
            "SELECT id, from_id, to_id, rel_type FROM edges
             WHERE from_id IN (SELECT value FROM json_each(?1))
                OR to_id IN (SELECT value FROM json_each(?1))
             ORDER BY id LIMIT ?2",
        )
        .map_err(query("prepare edges"))?;
    let rows = stmt
        .query_map(params![id_list(ids)?, limit as i64], |row| {
            Ok(EdgeRow { id: row.get(0)?, from_id: row.get(1)?, to_id: row.get(2)?, rel_type: row.get(3)? })
        })
        .map_err(query("edges"))?;
    rows.map(|r| r.map_err(query("edges row"))).collect()
}

/// Multi-source undirected BFS bounded by `max_depth`, one query per hop over
/// the frontier. Returns node id → hop distance (sources at 0).
fn expand(conn: &Connection, sources: &[i64], max_depth: usize) -> Result<HashMap<i64, usize>, GraphError> {
    let mut dist: HashMap<i64, usize> = sources.iter().map(|id| (*id, 0)).collect();
    let mut frontier: Vec<i64> = dist.keys().copied().collect();
    let mut stmt = conn
        .prepare(
            "SELECT to_id FROM edges WHERE from_id IN (SELECT value FROM json_each(?1))
             UNION
             SELECT from_id FROM edges WHERE to_id IN (SELECT value FROM json_each(?1))",
        )
        .map_err(query("prepare expand"))?;
    for depth in 1..=max_depth {
        if frontier.is_empty() {
            break;
        }
        let found = stmt
            .query_map(params![id_list(&frontier)?], |row| row.get::<_, i64>(0))
            .map_err(query("expand"))?;
        let mut next = Vec::new();
        for id in found {
            let id = id.map_err(query("expand row"))?;
            if !dist.contains_key(&id) {
                dist.insert(id, depth);
                next.push(id);
            }
        }
        frontier = next;
    }
    Ok(dist)
}

fn unavailable(context: &'static str) -> impl Fn(rusqlite::Error) -> GraphError {
    move |e| GraphError::Unavailable(format!("{context}: {e}"))
}

fn query(context: &'static str) -> impl Fn(rusqlite::Error) -> GraphError {
    move |e| GraphError::Query(format!("{context}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EntityLabel;
    use tempfile::TempDir;

    fn make_graph() -> (TempDir, EmbeddedGraph) {
        let temp = TempDir::new().expect("tempdir");
        let graph = EmbeddedGraph::open(&temp.path().join("graph.db")).expect("open graph");
        (temp, graph)
    }

    fn key(label: EntityLabel, name: &str) -> EntityKey {
        EntityKey::new(label, name)
    }

    #[tokio::test]
    async fn expansion_stops_at_depth() {
        let (_temp, g) = make_graph();
        for (a, b) in [("n1", "n2"), ("n2", "n3"), ("n3", "n4"), ("n9", "n8")] {
            let (a, b) = (key(EntityLabel::Concept, a), key(EntityLabel::Concept, b));
            g.merge_relationship(&a, &b, RelationType::RelatesTo, &Properties::new()).await.unwrap();
        }
        let conn = g.open_conn().unwrap();
        let start = node_ids_named(&conn, "n1").unwrap();
        let d = expand(&conn, &start, 2).unwrap();
        assert_eq!(d.len(), 3);
        let n3 = node_ids_named(&conn, "n3").unwrap()[0];
        assert_eq!(d.get(&n3), Some(&2));

        // edge reads are capped in SQL
        let all: Vec<i64> = d.keys().copied().collect();
        assert_eq!(edges_touching(&conn, &all, 1).unwrap().len(), 1);
        assert_eq!(edges_touching(&conn, &all, 10).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn neighbors_are_per_node() {
        let (_temp, g) = make_graph();
        let hub = key(EntityLabel::Concept, "Hub");
        for label in [EntityLabel::System, EntityLabel::Technology] {
            g.merge_relationship(&hub, &key(label, "Kafka"), RelationType::Uses, &Properties::new())
                .await
                .unwrap();
        }
        let n = g.neighbors("Hub", 1).await.unwrap();
        let got: Vec<(&str, &str)> = n.iter().map(|x| (x.name.as_str(), x.labels[0].as_str())).collect();
        assert_eq!(got, vec![("Kafka", "System"), ("Kafka", "Technology")]);
    }

    #[tokio::test]
    async fn merge_entity_is_idempotent() {
        let (_temp, g) = make_graph();
        let mut props = Properties::new();
        props.insert("owner".into(), "it".into());
        g.merge_entity(&key(EntityLabel::Policy, "Access Policy"), &props).await.unwrap();
        g.merge_entity(&key(EntityLabel::Policy, "Access Policy"), &Properties::new()).await.unwrap();
        let all = g.list_entities(10).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].labels, vec!["Policy".to_string()]);
    }

    #[tokio::test]
    async fn relationship_creates_endpoints_and_dedups() {
        let (_temp, g) = make_graph();
        let a = key(EntityLabel::System, "Payroll");
        let b = key(EntityLabel::Technology, "PostgreSQL");
        for _ in 0..2 {
            g.merge_relationship(&a, &b, RelationType::Uses, &Properties::new()).await.unwrap();
        }
        g.merge_relationship(&a, &b, RelationType::DependsOn, &Properties::new()).await.unwrap();
        assert_eq!(g.list_entities(10).await.unwrap().len(), 2);
        let sub = g.subgraph("Payroll", SubgraphLimits::clamped(1, 10, 10)).await.unwrap();
        assert_eq!(sub.edges.len(), 2);
    }

    #[tokio::test]
    async fn neighbors_are_undirected_and_distance_ordered() {
        let (_temp, g) = make_graph();
        let a = key(EntityLabel::Concept, "A");
        let b = key(EntityLabel::Concept, "B");
        let c = key(EntityLabel::Concept, "C");
        g.merge_relationship(&b, &a, RelationType::PartOf, &Properties::new()).await.unwrap();
        g.merge_relationship(&b, &c, RelationType::RelatesTo, &Properties::new()).await.unwrap();
        g.merge_relationship(&a, &c, RelationType::RelatesTo, &Properties::new()).await.unwrap();

        let n = g.neighbors("A", 2).await.unwrap();
        let names: Vec<(&str, u32)> = n.iter().map(|x| (x.name.as_str(), x.distance)).collect();
        assert_eq!(names, vec![("B", 1), ("C", 1)]);
        assert!(g.neighbors("missing", 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_limited() {
        let (_temp, g) = make_graph();
        for name in ["Data Retention", "data lake", "Retention Schedule"] {
            g.merge_entity(&key(EntityLabel::Concept, name), &Properties::new()).await.unwrap();
        }
        let hits = g.search_by_name("DATA", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(g.search_by_name("retention", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let (_temp, g) = make_graph();
        g.merge_relationship(
            &key(EntityLabel::Person, "Ada"),
            &key(EntityLabel::Organization, "Acme"),
            RelationType::PartOf,
            &Properties::new(),
        )
        .await
        .unwrap();
        g.clear().await.unwrap();
        assert!(g.list_entities(10).await.unwrap().is_empty());
        assert!(g.subgraph("Ada", SubgraphLimits::clamped(2, 10, 10)).await.unwrap().is_not_found());
    }
}
