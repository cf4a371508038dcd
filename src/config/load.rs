//! Configuration loading with env-var overrides.
//!
//! Reads TOML files, follows `[meta] base = "..."` inheritance chains and
//! applies `DOCINTEL_WORK_DIR` / `DOCINTEL_LOG_LEVEL` overrides. Secrets
//! (`LLM_API_KEY`, `EMBEDDINGS_API_KEY`, `NEO4J_PASSWORD`) only ever come
//! from the environment.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AppError;

use super::raw::RawConfig;
use super::types::*;

/// Deep-merge two TOML values. Tables merge recursively; any other value in
/// the overlay replaces the base value wholesale.
fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_tbl), toml::Value::Table(overlay_tbl)) => {
            for (key, ov_val) in overlay_tbl {
                let merged = match base_tbl.remove(&key) {
                    Some(base_val) => merge_toml(base_val, ov_val),
                    None => ov_val,
                };
                base_tbl.insert(key, merged);
            }
            toml::Value::Table(base_tbl)
        }
        (_, overlay) => overlay,
    }
}

/// Read `path`, follow its `[meta] base` chain and return the merged value.
/// `visited` holds canonical paths already seen so cycles fail fast.
fn load_raw_merged(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<toml::Value, AppError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Err(AppError::Config(format!(
            "circular base reference detected at: {}",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
    let overlay: toml::Value = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let base = overlay
        .get("meta")
        .and_then(|m| m.get("base"))
        .and_then(|b| b.as_str())
        .map(|b| {
            if Path::new(b).is_absolute() {
                PathBuf::from(b)
            } else {
                path.parent().unwrap_or(Path::new(".")).join(b)
            }
        });

    match base {
        Some(base_path) => Ok(merge_toml(load_raw_merged(&base_path, visited)?, overlay)),
        None => Ok(overlay),
    }
}

/// Load config from `config_path`, else `config/default.toml`, else built-in
/// defaults, then apply env overrides.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let work_dir_override = env::var("DOCINTEL_WORK_DIR").ok();
    let log_level_override = env::var("DOCINTEL_LOG_LEVEL").ok();

    let path = match config_path {
        Some(p) => Some(PathBuf::from(p)),
        None => Some(PathBuf::from("config/default.toml")).filter(|p| p.exists()),
    };

    match path {
        Some(p) => load_from(&p, work_dir_override.as_deref(), log_level_override.as_deref()),
        None => resolve(
            RawConfig::default(),
            work_dir_override.as_deref(),
            log_level_override.as_deref(),
        ),
    }
}

/// Load from an explicit path. Tests pass overrides directly instead of
/// mutating process env.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let merged = load_raw_merged(path, &mut HashSet::new())?;
    let parsed: RawConfig = Deserialize::deserialize(merged).map_err(|e: toml::de::Error| {
        AppError::Config(format!("config error in {}: {e}", path.display()))
    })?;
    resolve(parsed, work_dir_override, log_level_override)
}

fn resolve(
    parsed: RawConfig,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let work_dir = expand_home(work_dir_override.unwrap_or(&parsed.app.work_dir));
    let log_level = log_level_override.unwrap_or(&parsed.app.log_level).to_string();

    let backend = GraphBackend::parse(&parsed.graph.backend).ok_or_else(|| {
        AppError::Config(format!("unknown graph backend: '{}'", parsed.graph.backend))
    })?;

    if parsed.embeddings.hashing.dimensions == 0 {
        return Err(AppError::Config("embeddings.hashing.dimensions must be > 0".into()));
    }

    let llm_api_key = env::var("LLM_API_KEY").ok();
    let embeddings_api_key = env::var("EMBEDDINGS_API_KEY").ok().or_else(|| llm_api_key.clone());

    Ok(Config {
        app_name: parsed.app.name,
        log_file: parsed.app.log_file.map(|p| under(&work_dir, &p)),
        log_level,
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
        },
        llm_api_key,
        embeddings: EmbeddingsConfig {
            provider: parsed.embeddings.provider,
            openai: OpenAiEmbeddingsConfig {
                api_base_url: parsed.embeddings.openai.api_base_url,
                model: parsed.embeddings.openai.model,
                timeout_seconds: parsed.embeddings.openai.timeout_seconds,
            },
            hashing: HashingConfig { dimensions: parsed.embeddings.hashing.dimensions },
        },
        embeddings_api_key,
        vectorstore: VectorStoreConfig {
            path: under(&work_dir, &parsed.vectorstore.path),
            collection: parsed.vectorstore.collection,
        },
        graph: GraphConfig {
            backend,
            embedded: EmbeddedGraphConfig { path: under(&work_dir, &parsed.graph.embedded.path) },
            neo4j: Neo4jConfig {
                uri: parsed.graph.neo4j.uri.trim_end_matches('/').to_string(),
                user: parsed.graph.neo4j.user,
                database: parsed.graph.neo4j.database,
                timeout_seconds: parsed.graph.neo4j.timeout_seconds.max(1),
            },
        },
        neo4j_password: env::var("NEO4J_PASSWORD").ok(),
        ingest: IngestConfig {
            data_dir: expand_home(&parsed.ingest.data_dir),
            chunk_size: parsed.ingest.chunk_size,
            chunk_overlap: parsed.ingest.chunk_overlap,
            strategy: parsed.ingest.strategy,
        },
        server: ServerConfig {
            bind: parsed.server.bind,
            request_timeout_seconds: parsed.server.request_timeout_seconds.max(1),
        },
        work_dir,
    })
}

/// Resolve a store path: `~` expands, relative paths land under `work_dir`.
fn under(work_dir: &Path, path: &str) -> PathBuf {
    let p = expand_home(path);
    if p.is_absolute() { p } else { work_dir.join(p) }
}

/// Expand a leading `~` to the user's home directory.
/// Paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
