//! Persistent vector index on SQLite.
//!
//! One table holds chunk text, JSON metadata and the embedding as a
//! little-endian `f32` blob, partitioned by collection name. Search is a
//! brute-force cosine scan, which is plenty for a single-host corpus.
//!
//! Every row records the embedding model that produced it. Search and count
//! only see rows written under the index's own model key, so switching
//! models never compares vectors from different spaces; `open` warns when
//! the collection still holds rows from another model.
//!
//! All rusqlite work is blocking; the public async methods hop onto the
//! blocking pool with `spawn_blocking`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, params};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::embeddings::cosine_distance;

/// Free-form chunk metadata (`source`, `type`, `chunk_index`, `strategy`, …).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

const SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("vector store: {0}")]
    Storage(String),
    #[error("vector store task failed: {0}")]
    Join(String),
}

/// A chunk ready for upsert.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub embedding: Vec<f32>,
}

/// One nearest-neighbor hit. `score` is `1 - cosine distance`, clamped to `[0, 1]`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub score: f32,
}

impl SearchResult {
    /// `metadata["source"]` as a string, or `"unknown"`.
    pub fn source(&self) -> &str {
        self.metadata.get("source").and_then(|v| v.as_str()).unwrap_or("unknown")
    }
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    db_path: PathBuf,
    collection: String,
    model_key: String,
}

impl VectorIndex {
    /// Open (or create) the index file. Safe to call repeatedly.
    pub fn open(db_path: &Path, collection: &str, model_key: &str) -> Result<Self, VectorStoreError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                VectorStoreError::Storage(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let index = Self {
            db_path: db_path.to_path_buf(),
            collection: collection.to_string(),
            model_key: model_key.to_string(),
        };
        index.init_db()?;
        let stale = index.foreign_model_rows()?;
        if stale > 0 {
            warn!(
                collection = %index.collection,
                model_key = %index.model_key,
                stale,
                "collection holds chunks from another embedding model; they are ignored until re-ingested"
            );
        }
        Ok(index)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    // ── Async API ─────────────────────────────────────────────────────────

    /// Insert or replace chunks by id. Returns the number written.
    pub async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<usize, VectorStoreError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.upsert_blocking(&records))
            .await
            .map_err(|e| VectorStoreError::Join(format!("upsert join: {e}")))?
    }

    /// Top `top_k` chunks by descending similarity. When `filter` is given,
    /// only chunks whose metadata contains every filter key with an equal
    /// value are considered.
    pub async fn search(
        &self,
        query: Vec<f32>,
        top_k: usize,
        filter: Option<Metadata>,
    ) -> Result<Vec<SearchResult>, VectorStoreError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.search_blocking(&query, top_k, filter.as_ref()))
            .await
            .map_err(|e| VectorStoreError::Join(format!("search join: {e}")))?
    }

    pub async fn count(&self) -> Result<usize, VectorStoreError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.count_blocking())
            .await
            .map_err(|e| VectorStoreError::Join(format!("count join: {e}")))?
    }

    /// Drop every chunk in this collection.
    pub async fn reset(&self) -> Result<(), VectorStoreError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.reset_blocking())
            .await
            .map_err(|e| VectorStoreError::Join(format!("reset join: {e}")))?
    }

    // ── Blocking internals ────────────────────────────────────────────────

    fn upsert_blocking(&self, records: &[ChunkRecord]) -> Result<usize, VectorStoreError> {
        let mut conn = open_conn(&self.db_path)?;
        let tx = conn.transaction().map_err(storage("begin upsert tx"))?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO chunks (collection, id, text, metadata, embedding, model_key, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(collection, id) DO UPDATE SET
                        text = excluded.text,
                        metadata = excluded.metadata,
                        embedding = excluded.embedding,
                        model_key = excluded.model_key,
                        updated_at = excluded.updated_at",
                )
                .map_err(storage("prepare upsert"))?;
            for r in records {
                let metadata = serde_json::to_string(&r.metadata)
                    .map_err(|e| VectorStoreError::Storage(format!("serialize metadata: {e}")))?;
                stmt.execute(params![
                    self.collection,
                    r.id,
                    r.text,
                    metadata,
                    encode_vector(&r.embedding),
                    self.model_key,
                    now,
                ])
                .map_err(storage("upsert chunk"))?;
            }
        }
        tx.commit().map_err(storage("commit upsert"))?;
        debug!(collection = %self.collection, count = records.len(), "upserted chunks");
        Ok(records.len())
    }

    fn search_blocking(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&Metadata>,
    ) -> Result<Vec<SearchResult>, VectorStoreError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let conn = open_conn(&self.db_path)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, text, metadata, embedding FROM chunks
                 WHERE collection = ?1 AND model_key = ?2",
            )
            .map_err(storage("prepare search"))?;
        let rows = stmt
            .query_map(params![self.collection, self.model_key], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            })
            .map_err(storage("query search"))?;

        let mut scored: Vec<(f32, SearchResult)> = Vec::new();
        for row in rows {
            let (id, text, metadata_json, blob) = row.map_err(storage("search row"))?;
            let metadata: Metadata = serde_json::from_str(&metadata_json).unwrap_or_default();
            if let Some(f) = filter {
                if !f.iter().all(|(k, v)| metadata.get(k) == Some(v)) {
                    continue;
                }
            }
            let distance = cosine_distance(query, &decode_vector(&blob));
            let score = (1.0 - distance).clamp(0.0, 1.0);
            scored.push((distance, SearchResult { id, text, metadata, score }));
        }

        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        Ok(scored.into_iter().take(top_k).map(|(_, r)| r).collect())
    }

    fn count_blocking(&self) -> Result<usize, VectorStoreError> {
        let conn = open_conn(&self.db_path)?;
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM chunks WHERE collection = ?1 AND model_key = ?2",
                params![self.collection, self.model_key],
                |row| row.get(0),
            )
            .map_err(storage("count"))?;
        Ok(n.max(0) as usize)
    }

    /// Rows in this collection embedded under a different model key.
    fn foreign_model_rows(&self) -> Result<usize, VectorStoreError> {
        let conn = open_conn(&self.db_path)?;
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM chunks WHERE collection = ?1 AND model_key != ?2",
                params![self.collection, self.model_key],
                |row| row.get(0),
            )
            .map_err(storage("count foreign rows"))?;
        Ok(n.max(0) as usize)
    }

    fn reset_blocking(&self) -> Result<(), VectorStoreError> {
        let conn = open_conn(&self.db_path)?;
        conn.execute("DELETE FROM chunks WHERE collection = ?1", params![self.collection])
            .map_err(storage("reset"))?;
        Ok(())
    }

    fn init_db(&self) -> Result<(), VectorStoreError> {
        let conn = open_conn(&self.db_path)?;
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(storage("read schema version"))?;
        if version >= SCHEMA_VERSION {
            return Ok(());
        }
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS chunks (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                text TEXT NOT NULL,
                metadata TEXT NOT NULL,
                embedding BLOB NOT NULL,
                model_key TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );
            PRAGMA user_version = 1;
            ",
        )
        .map_err(storage("initialize schema"))
    }
}

fn open_conn(db_path: &Path) -> Result<Connection, VectorStoreError> {
    let conn = Connection::open(db_path)
        .map_err(|e| VectorStoreError::Storage(format!("open {}: {e}", db_path.display())))?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(storage("set journal_mode WAL"))?;
    conn.pragma_update(None, "busy_timeout", 5000)
        .map_err(storage("set busy_timeout"))?;
    Ok(conn)
}

fn storage(context: &'static str) -> impl Fn(rusqlite::Error) -> VectorStoreError {
    move |e| VectorStoreError::Storage(format!("{context}: {e}"))
}

fn encode_vector(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
