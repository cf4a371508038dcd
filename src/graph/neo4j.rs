//! Neo4j backend over the HTTP transaction endpoint
//! (`POST {uri}/db/{database}/tx/commit`).
//!
//! Every call is a single auto-committed statement. Labels and relationship
//! types are interpolated after `schema_token()`; everything else is bound as
//! a parameter.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{
    EntityKey, EntityRef, GraphEdge, GraphError, GraphNode, Neighbor, Properties, RelationType,
    Subgraph, SubgraphLimits, assemble_subgraph,
};
use crate::config::Neo4jConfig;
use crate::llm::providers::openai_compatible::check_status;

type Row = serde_json::Map<String, Value>;

#[derive(Debug, Clone)]
pub struct Neo4jGraph {
    client: Client,
    endpoint: String,
    user: String,
    password: Option<String>,
}

impl Neo4jGraph {
    pub fn new(config: &Neo4jConfig, password: Option<String>) -> Result<Self, GraphError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| GraphError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        let endpoint = format!(
            "{}/db/{}/tx/commit",
            config.uri.trim_end_matches('/'),
            config.database
        );
        Ok(Self { client, endpoint, user: config.user.clone(), password })
    }

    pub async fn ping(&self) -> Result<(), GraphError> {
        self.run("RETURN 1 AS ok", json!({})).await.map(|_| ())
    }

    pub async fn merge_entity(&self, key: &EntityKey, properties: &Properties) -> Result<(), GraphError> {
        let statement = format!("MERGE (e:{} {{name: $name}}) SET e += $props", key.label.schema_token());
        self.run(&statement, json!({ "name": key.name, "props": properties })).await?;
        Ok(())
    }

    pub async fn merge_relationship(
        &self,
        from: &EntityKey,
        to: &EntityKey,
        rel_type: RelationType,
        properties: &Properties,
    ) -> Result<(), GraphError> {
        let statement = format!(
            "MERGE (a:{} {{name: $from_name}}) \
             MERGE (b:{} {{name: $to_name}}) \
             MERGE (a)-[r:{}]->(b) SET r += $props",
            from.label.schema_token(),
            to.label.schema_token(),
            rel_type.schema_token(),
        );
        let params = json!({ "from_name": from.name, "to_name": to.name, "props": properties });
        self.run(&statement, params).await?;
        Ok(())
    }

    pub async fn neighbors(&self, name: &str, hops: usize) -> Result<Vec<Neighbor>, GraphError> {
        // Variable-length bounds cannot be parameters; `hops` is already clamped.
        let statement = format!(
            "MATCH path = (start {{name: $name}})-[*1..{hops}]-(neighbor) \
             WHERE neighbor <> start AND neighbor.name <> $name \
             WITH neighbor, min(length(path)) AS distance \
             RETURN neighbor.name AS name, labels(neighbor) AS labels, distance \
             ORDER BY distance, name"
        );
        let rows = self.run(&statement, json!({ "name": name })).await?;
        rows.iter()
            .map(|row| {
                Ok(Neighbor {
                    name: str_field(row, "name")?,
                    labels: labels_field(row)?,
                    distance: row
                        .get("distance")
                        .and_then(Value::as_u64)
                        .ok_or_else(|| GraphError::Decode("missing distance".into()))?
                        as u32,
                })
            })
            .collect()
    }

    pub async fn search_by_name(&self, query: &str, limit: usize) -> Result<Vec<EntityRef>, GraphError> {
        let rows = self
            .run(
                "MATCH (e) WHERE toLower(e.name) CONTAINS toLower($query) \
                 RETURN e.name AS name, labels(e) AS labels LIMIT $limit",
                json!({ "query": query, "limit": limit }),
            )
            .await?;
        rows.iter().map(entity_ref).collect()
    }

    pub async fn list_entities(&self, limit: usize) -> Result<Vec<EntityRef>, GraphError> {
        let rows = self
            .run(
                "MATCH (e) WHERE e.name IS NOT NULL RETURN e.name AS name, labels(e) AS labels LIMIT $limit",
                json!({ "limit": limit }),
            )
            .await?;
        rows.iter().map(entity_ref).collect()
    }

    pub async fn subgraph(&self, name: &str, limits: SubgraphLimits) -> Result<Subgraph, GraphError> {
        let rows = self
            .run(
                "MATCH (start {name: $name}) \
                 RETURN elementId(start) AS id, start.name AS name, labels(start) AS labels LIMIT 1",
                json!({ "name": name }),
            )
            .await?;
        let Some(start_row) = rows.first() else {
            return Ok(Subgraph::default());
        };
        let start = graph_node(start_row)?;
        let hops = limits.max_hops;

        let node_rows = self
            .run(
                &format!(
                    "MATCH (start) WHERE elementId(start) = $start_id \
                     MATCH path = (start)-[*1..{hops}]-() \
                     UNWIND nodes(path) AS n \
                     WITH DISTINCT n LIMIT $node_limit \
                     RETURN elementId(n) AS id, n.name AS name, labels(n) AS labels"
                ),
                json!({ "start_id": start.id, "node_limit": limits.node_limit }),
            )
            .await?;
        let raw_nodes = node_rows.iter().map(graph_node).collect::<Result<Vec<_>, _>>()?;

        let edge_rows = self
            .run(
                &format!(
                    "MATCH (start) WHERE elementId(start) = $start_id \
                     MATCH path = (start)-[*1..{hops}]-() \
                     UNWIND relationships(path) AS r \
                     WITH DISTINCT r LIMIT $edge_limit \
                     RETURN elementId(r) AS id, elementId(startNode(r)) AS source, \
                            elementId(endNode(r)) AS target, type(r) AS type"
                ),
                json!({ "start_id": start.id, "edge_limit": limits.edge_limit }),
            )
            .await?;
        let raw_edges = edge_rows
            .iter()
            .map(|row| {
                Ok(GraphEdge {
                    id: str_field(row, "id")?,
                    source: str_field(row, "source")?,
                    target: str_field(row, "target")?,
                    rel_type: str_field(row, "type")?,
                })
            })
            .collect::<Result<Vec<_>, GraphError>>()?;

        Ok(assemble_subgraph(start, raw_nodes, raw_edges, limits))
    }

    pub async fn clear(&self) -> Result<(), GraphError> {
        self.run("MATCH (n) DETACH DELETE n", json!({})).await?;
        Ok(())
    }

    /// Run one statement and return its rows keyed by column name.
    async fn run(&self, statement: &str, parameters: Value) -> Result<Vec<Row>, GraphError> {
        let body = TxRequest { statements: vec![TxStatement { statement, parameters }] };
        debug!(statement, "neo4j statement");

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.user, self.password.as_deref())
            .json(&body)
            .send()
            .await
            .map_err(|e| GraphError::Unavailable(e.to_string()))?;
        let response = check_status(response).await.map_err(GraphError::Unavailable)?;
        let parsed: TxResponse = response
            .json()
            .await
            .map_err(|e| GraphError::Decode(format!("failed to parse response body: {e}")))?;

        if let Some(err) = parsed.errors.first() {
            warn!(code = %err.code, "neo4j statement rejected");
            return Err(GraphError::Query(format!("{}: {}", err.code, err.message)));
        }
        let Some(result) = parsed.results.into_iter().next() else {
            return Ok(Vec::new());
        };
        Ok(result
            .data
            .into_iter()
            .map(|d| result.columns.iter().cloned().zip(d.row).collect())
            .collect())
    }
}

fn str_field(row: &Row, key: &str) -> Result<String, GraphError> {
    row.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GraphError::Decode(format!("missing string column '{key}'")))
}

fn labels_field(row: &Row) -> Result<Vec<String>, GraphError> {
    let labels = row
        .get("labels")
        .and_then(Value::as_array)
        .ok_or_else(|| GraphError::Decode("missing labels column".into()))?;
    Ok(labels.iter().filter_map(Value::as_str).map(str::to_string).collect())
}

fn entity_ref(row: &Row) -> Result<EntityRef, GraphError> {
    Ok(EntityRef { name: str_field(row, "name")?, labels: labels_field(row)? })
}

fn graph_node(row: &Row) -> Result<GraphNode, GraphError> {
    Ok(GraphNode {
        id: str_field(row, "id")?,
        // Nodes without a name property still render.
        name: row.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
        labels: labels_field(row)?,
    })
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct TxRequest<'a> {
    statements: Vec<TxStatement<'a>>,
}

#[derive(Debug, Serialize)]
struct TxStatement<'a> {
    statement: &'a str,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    columns: Vec<String>,
    data: Vec<TxRow>,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(uri: &str) -> Neo4jConfig {
        Neo4jConfig {
            uri: uri.into(),
            user: "neo4j".into(),
            database: "neo4j".into(),
            timeout_seconds: 1,
        }
    }

    #[test]
    fn endpoint_is_built_from_uri_and_database() {
        let g = Neo4jGraph::new(&config("http://db:7474/"), None).unwrap();
        assert_eq!(g.endpoint, "http://db:7474/db/neo4j/tx/commit");
    }

    #[test]
    fn response_rows_parse() {
        let body = r#"{"results":[{"columns":["name","labels","distance"],
            "data":[{"row":["B",["Concept"],1],"meta":[null,null,null]}]}],"errors":[]}"#;
        let parsed: TxResponse = serde_json::from_str(body).unwrap();
        let result = &parsed.results[0];
        let row: Row = result.columns.iter().cloned().zip(result.data[0].row.clone()).collect();
        assert_eq!(str_field(&row, "name").unwrap(), "B");
        assert_eq!(labels_field(&row).unwrap(), vec!["Concept".to_string()]);
    }

    #[test]
    fn error_payload_parses() {
        let body = r#"{"results":[],"errors":[{"code":"Neo.ClientError.Statement.SyntaxError","message":"bad"}]}"#;
        let parsed: TxResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.errors[0].code, "Neo.ClientError.Statement.SyntaxError");
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        let g = Neo4jGraph::new(&config("http://127.0.0.1:1"), Some("pw".into())).unwrap();
        assert!(matches!(g.ping().await, Err(GraphError::Unavailable(_))));
        assert!(matches!(g.neighbors("x", 2).await, Err(GraphError::Unavailable(_))));
    }
}
