//! Integration tests for the ingestion pipeline against an embedded graph.
//!
//! Run with:
//!   cargo test --test test_ingest

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use docintel::config::Config;
use docintel::embeddings::EmbeddingProvider;
use docintel::embeddings::hashing::HashingEmbedder;
use docintel::graph::GraphStore;
use docintel::graph::embedded::EmbeddedGraph;
use docintel::ingest::{IngestError, Pipeline};
use docintel::llm::LlmProvider;
use docintel::llm::providers::scripted::ScriptedProvider;
use docintel::rag::GraphStatus;
use docintel::vectorstore::VectorIndex;

// ── helpers ──────────────────────────────────────────────────────────────────

struct Env {
    tmp: TempDir,
    config: Config,
    embedder: EmbeddingProvider,
    index: VectorIndex,
    graph: GraphStore,
}

fn env() -> Env {
    let tmp = TempDir::new().expect("tempdir");
    let config = Config::offline(tmp.path());
    fs::create_dir_all(&config.ingest.data_dir).unwrap();
    let embedder = EmbeddingProvider::Hashing(HashingEmbedder::new(256));
    let index = VectorIndex::open(&config.vectorstore.path, "ingest", &embedder.model_key()).unwrap();
    let graph = GraphStore::Embedded(EmbeddedGraph::open(&config.graph.embedded.path).unwrap());
    Env { tmp, config, embedder, index, graph }
}

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).unwrap();
}

const SECURITY_REPLY: &str = r#"{"entities":[{"name":"MFA","label":"Policy"},
    {"name":"VPN","label":"Technology"},{"name":"Rex","label":"Animal"}],
    "relationships":[{"from":"MFA","to":"VPN","type":"GOVERNS"}]}"#;

// ── tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_directory_reports_zeros() {
    let e = env();
    let llm = LlmProvider::Scripted(ScriptedProvider::new());
    let pipeline = Pipeline {
        config: &e.config.ingest,
        embedder: &e.embedder,
        index: &e.index,
        llm: &llm,
        graph: Some(&e.graph),
    };
    let report = pipeline.run(None).await.unwrap();
    assert_eq!(report.documents, 0);
    assert_eq!(report.chunks, 0);
    assert_eq!(report.entities, 0);
    assert_eq!(e.index.count().await.unwrap(), 0);
}

#[tokio::test]
async fn missing_directory_is_an_error() {
    let e = env();
    let llm = LlmProvider::Scripted(ScriptedProvider::new());
    let pipeline =
        Pipeline { config: &e.config.ingest, embedder: &e.embedder, index: &e.index, llm: &llm, graph: None };
    let err = pipeline.run(Some(&e.tmp.path().join("nope"))).await.unwrap_err();
    assert!(matches!(err, IngestError::MissingDirectory(_)));
}

#[tokio::test]
async fn documents_land_in_both_stores() {
    let e = env();
    let docs = &e.config.ingest.data_dir;
    write(docs, "security.md", "# Security\n\nMFA is required for all VPN access.");
    write(docs, "notes.txt", "Quarterly review notes.");
    write(docs, "image.png", "not a document");

    // files are processed in path order: notes.txt, then security.md
    let scripted = ScriptedProvider::new().reply(r#"{"entities":[],"relationships":[]}"#).reply(SECURITY_REPLY);
    let llm = LlmProvider::Scripted(scripted.clone());
    let pipeline = Pipeline {
        config: &e.config.ingest,
        embedder: &e.embedder,
        index: &e.index,
        llm: &llm,
        graph: Some(&e.graph),
    };
    let report = pipeline.run(None).await.unwrap();

    assert_eq!(report.documents, 2);
    assert_eq!(report.chunks, 2);
    assert_eq!(report.entities, 2);
    assert_eq!(report.relationships, 1);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.graph, GraphStatus::Used);
    assert_eq!(e.index.count().await.unwrap(), 2);
    assert_eq!(scripted.calls().len(), 2);

    let hits = e.graph.search_by_name("mfa", 10).await.unwrap();
    let mfa = hits.iter().find(|h| h.name == "MFA").expect("MFA stored");
    assert_eq!(mfa.labels, vec!["Policy".to_string()]);
    let rex = e.graph.search_by_name("Rex", 10).await.unwrap();
    assert!(!rex.iter().any(|h| h.name == "Rex"));

    let around = e.graph.neighbors("MFA", 1).await.unwrap();
    let names: Vec<&str> = around.iter().map(|n| n.name.as_str()).collect();
    assert!(names.contains(&"VPN"));
    assert!(names.iter().any(|n| n.ends_with("security.md")));
}

#[tokio::test]
async fn reingesting_is_idempotent() {
    let e = env();
    write(&e.config.ingest.data_dir, "security.md", "MFA is required for all VPN access.");
    let llm = LlmProvider::Scripted(ScriptedProvider::new().reply(SECURITY_REPLY).reply(SECURITY_REPLY));
    let pipeline = Pipeline {
        config: &e.config.ingest,
        embedder: &e.embedder,
        index: &e.index,
        llm: &llm,
        graph: Some(&e.graph),
    };
    pipeline.run(None).await.unwrap();
    pipeline.run(None).await.unwrap();

    assert_eq!(e.index.count().await.unwrap(), 1);
    // Document, MFA, VPN
    assert_eq!(e.graph.list_entities(100).await.unwrap().len(), 3);
}

#[tokio::test]
async fn extraction_failure_keeps_vectors() {
    let e = env();
    write(&e.config.ingest.data_dir, "a.txt", "alpha");
    write(&e.config.ingest.data_dir, "b.txt", "beta");
    let llm = LlmProvider::Scripted(ScriptedProvider::new().fail("rate limited").reply(SECURITY_REPLY));
    let pipeline = Pipeline {
        config: &e.config.ingest,
        embedder: &e.embedder,
        index: &e.index,
        llm: &llm,
        graph: Some(&e.graph),
    };
    let report = pipeline.run(None).await.unwrap();

    assert_eq!(report.chunks, 2);
    assert_eq!(e.index.count().await.unwrap(), 2);
    assert_eq!(report.entities, 2);
    assert!(matches!(report.graph, GraphStatus::Degraded { .. }));
}
