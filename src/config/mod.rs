//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or the file given with `-f`), then applies `DOCINTEL_WORK_DIR` and
//! `DOCINTEL_LOG_LEVEL` overrides.
//!
//! # Module layout
//!
//! - **types**: public structs handed to constructors (`Config`, `LlmConfig`, …).
//! - **raw**: serde targets mirroring the file shape, with defaults; private.
//! - **load**: `merge_toml`, `[meta] base` chains, `load`, `load_from`, `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{expand_home, load, load_from};
pub use types::*;

impl Config {
    /// Self-contained config for tests and offline runs: dummy LLM, hashing
    /// embedder, embedded graph, everything under `work_dir`.
    pub fn offline(work_dir: &std::path::Path) -> Self {
        Self {
            app_name: "docintel-test".into(),
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            log_file: None,
            llm: LlmConfig {
                provider: "dummy".into(),
                openai: OpenAiConfig {
                    api_base_url: "http://127.0.0.1:1/v1/chat/completions".into(),
                    model: "test-model".into(),
                    timeout_seconds: 1,
                },
            },
            llm_api_key: None,
            embeddings: EmbeddingsConfig {
                provider: "hashing".into(),
                openai: OpenAiEmbeddingsConfig {
                    api_base_url: "http://127.0.0.1:1/v1/embeddings".into(),
                    model: "test-embed".into(),
                    timeout_seconds: 1,
                },
                hashing: HashingConfig { dimensions: raw::default_hashing_dimensions() },
            },
            embeddings_api_key: None,
            vectorstore: VectorStoreConfig {
                path: work_dir.join("vectors.db"),
                collection: "test".into(),
            },
            graph: GraphConfig {
                backend: GraphBackend::Embedded,
                embedded: EmbeddedGraphConfig { path: work_dir.join("graph.db") },
                neo4j: Neo4jConfig {
                    uri: "http://127.0.0.1:1".into(),
                    user: "neo4j".into(),
                    database: "neo4j".into(),
                    timeout_seconds: 1,
                },
            },
            neo4j_password: None,
            ingest: IngestConfig {
                data_dir: work_dir.join("docs"),
                chunk_size: raw::default_chunk_size(),
                chunk_overlap: raw::default_chunk_overlap(),
                strategy: "recursive".into(),
            },
            server: ServerConfig { bind: raw::default_bind(), request_timeout_seconds: 30 },
        }
    }
}
