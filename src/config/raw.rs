//! Raw TOML deserialization types.
//!
//! These structs mirror the file shape and carry serde defaults; `load`
//! resolves them into the public `types` structs.

use serde::Deserialize;

// ── Top-level ────────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub app: RawApp,
    #[serde(default)]
    pub llm: RawLlm,
    #[serde(default)]
    pub embeddings: RawEmbeddings,
    #[serde(default)]
    pub vectorstore: RawVectorStore,
    #[serde(default)]
    pub graph: RawGraph,
    #[serde(default)]
    pub ingest: RawIngest,
    #[serde(default)]
    pub server: RawServer,
}

#[derive(Deserialize)]
pub(super) struct RawApp {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for RawApp {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            work_dir: default_work_dir(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

// ── LLM ──────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawLlm {
    #[serde(rename = "default", default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub openai: RawOpenAi,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAi::default() }
    }
}

#[derive(Deserialize)]
pub(super) struct RawOpenAi {
    #[serde(default = "default_chat_url")]
    pub api_base_url: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RawOpenAi {
    fn default() -> Self {
        Self {
            api_base_url: default_chat_url(),
            model: default_chat_model(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

// ── Embeddings ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawEmbeddings {
    #[serde(default = "default_embeddings_provider")]
    pub provider: String,
    #[serde(default)]
    pub openai: RawOpenAiEmbeddings,
    #[serde(default)]
    pub hashing: RawHashing,
}

impl Default for RawEmbeddings {
    fn default() -> Self {
        Self {
            provider: default_embeddings_provider(),
            openai: RawOpenAiEmbeddings::default(),
            hashing: RawHashing::default(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawOpenAiEmbeddings {
    #[serde(default = "default_embeddings_url")]
    pub api_base_url: String,
    #[serde(default = "default_embeddings_model")]
    pub model: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RawOpenAiEmbeddings {
    fn default() -> Self {
        Self {
            api_base_url: default_embeddings_url(),
            model: default_embeddings_model(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawHashing {
    #[serde(default = "default_hashing_dimensions")]
    pub dimensions: usize,
}

impl Default for RawHashing {
    fn default() -> Self {
        Self { dimensions: default_hashing_dimensions() }
    }
}

// ── Stores ───────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawVectorStore {
    #[serde(default = "default_vector_path")]
    pub path: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for RawVectorStore {
    fn default() -> Self {
        Self { path: default_vector_path(), collection: default_collection() }
    }
}

#[derive(Deserialize)]
pub(super) struct RawGraph {
    #[serde(default = "default_graph_backend")]
    pub backend: String,
    #[serde(default)]
    pub embedded: RawEmbeddedGraph,
    #[serde(default)]
    pub neo4j: RawNeo4j,
}

impl Default for RawGraph {
    fn default() -> Self {
        Self {
            backend: default_graph_backend(),
            embedded: RawEmbeddedGraph::default(),
            neo4j: RawNeo4j::default(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawEmbeddedGraph {
    #[serde(default = "default_graph_path")]
    pub path: String,
}

impl Default for RawEmbeddedGraph {
    fn default() -> Self {
        Self { path: default_graph_path() }
    }
}

#[derive(Deserialize)]
pub(super) struct RawNeo4j {
    #[serde(default = "default_neo4j_uri")]
    pub uri: String,
    #[serde(default = "default_neo4j_user")]
    pub user: String,
    #[serde(default = "default_neo4j_database")]
    pub database: String,
    #[serde(default = "default_neo4j_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RawNeo4j {
    fn default() -> Self {
        Self {
            uri: default_neo4j_uri(),
            user: default_neo4j_user(),
            database: default_neo4j_database(),
            timeout_seconds: default_neo4j_timeout_seconds(),
        }
    }
}

// ── Ingest / server ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawIngest {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: i64,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: i64,
    #[serde(default = "default_strategy")]
    pub strategy: String,
}

impl Default for RawIngest {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            strategy: default_strategy(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawServer {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for RawServer {
    fn default() -> Self {
        Self { bind: default_bind(), request_timeout_seconds: default_request_timeout_seconds() }
    }
}

// ── Default functions (used by serde) ────────────────────────────────────────

fn default_app_name() -> String {
    "docintel".to_string()
}
fn default_work_dir() -> String {
    "~/.docintel".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

fn default_llm_provider() -> String {
    "dummy".to_string()
}
fn default_chat_url() -> String {
    "http://localhost:11434/v1/chat/completions".to_string()
}
fn default_chat_model() -> String {
    "llama3.2".to_string()
}
fn default_timeout_seconds() -> u64 {
    120
}

fn default_embeddings_provider() -> String {
    "hashing".to_string()
}
fn default_embeddings_url() -> String {
    "http://localhost:11434/v1/embeddings".to_string()
}
fn default_embeddings_model() -> String {
    "nomic-embed-text".to_string()
}
pub(super) fn default_hashing_dimensions() -> usize {
    384
}

fn default_vector_path() -> String {
    "vectors.db".to_string()
}
fn default_collection() -> String {
    "enterprise_docs".to_string()
}

fn default_graph_backend() -> String {
    "embedded".to_string()
}
fn default_graph_path() -> String {
    "graph.db".to_string()
}
fn default_neo4j_uri() -> String {
    "http://localhost:7474".to_string()
}
fn default_neo4j_user() -> String {
    "neo4j".to_string()
}
fn default_neo4j_database() -> String {
    "neo4j".to_string()
}
fn default_neo4j_timeout_seconds() -> u64 {
    10
}

fn default_data_dir() -> String {
    "./data/sample_docs".to_string()
}
pub(super) fn default_chunk_size() -> i64 {
    512
}
pub(super) fn default_chunk_overlap() -> i64 {
    64
}
fn default_strategy() -> String {
    "recursive".to_string()
}

pub(super) fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_request_timeout_seconds() -> u64 {
    300
}
