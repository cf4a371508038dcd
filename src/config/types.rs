//! Public configuration types consumed by the rest of the crate.

use std::path::PathBuf;

/// Fully resolved configuration, built once in `main` and passed by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,
    pub work_dir: PathBuf,
    pub log_level: String,
    /// Append-mode log file; stderr when `None`.
    pub log_file: Option<PathBuf>,
    pub llm: LlmConfig,
    /// From `LLM_API_KEY`. Never read from TOML.
    pub llm_api_key: Option<String>,
    pub embeddings: EmbeddingsConfig,
    /// From `EMBEDDINGS_API_KEY`, falling back to `LLM_API_KEY`.
    pub embeddings_api_key: Option<String>,
    pub vectorstore: VectorStoreConfig,
    pub graph: GraphConfig,
    /// From `NEO4J_PASSWORD`.
    pub neo4j_password: Option<String>,
    pub ingest: IngestConfig,
    pub server: ServerConfig,
}

// ── LLM ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// `"dummy"` or `"openai"`.
    pub provider: String,
    pub openai: OpenAiConfig,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
}

// ── Embeddings ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EmbeddingsConfig {
    /// `"hashing"` or `"openai"`.
    pub provider: String,
    pub openai: OpenAiEmbeddingsConfig,
    pub hashing: HashingConfig,
}

#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingsConfig {
    pub api_base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct HashingConfig {
    pub dimensions: usize,
}

// ── Stores ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    /// SQLite file; relative paths resolve against `work_dir`.
    pub path: PathBuf,
    pub collection: String,
}

/// Which graph backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphBackend {
    Embedded,
    Neo4j,
    None,
}

impl GraphBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "embedded" | "sqlite" => Some(Self::Embedded),
            "neo4j" => Some(Self::Neo4j),
            "none" | "disabled" => Some(Self::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub backend: GraphBackend,
    pub embedded: EmbeddedGraphConfig,
    pub neo4j: Neo4jConfig,
}

#[derive(Debug, Clone)]
pub struct EmbeddedGraphConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    /// HTTP endpoint root, e.g. `http://localhost:7474`.
    pub uri: String,
    pub user: String,
    pub database: String,
    pub timeout_seconds: u64,
}

// ── Ingest / server ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub data_dir: PathBuf,
    pub chunk_size: i64,
    pub chunk_overlap: i64,
    /// `"recursive"` or `"fixed"`.
    pub strategy: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Deadline applied around a whole query request.
    pub request_timeout_seconds: u64,
}
