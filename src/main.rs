//! docintel entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Build the service (providers, vector index, graph store)
//!   6. Run the subcommand: `serve` (default), `ingest`, `ask`, `graph`

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use docintel::config;
use docintel::error::AppError;
use docintel::logger;
use docintel::server::{self, ApiState};
use docintel::service::{QueryMode, Service};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present; the file is optional.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    let force_cli_level = args.log_level.is_some();
    logger::init(effective_log_level, force_cli_level, config.log_file.as_deref())?;

    info!(
        app_name = %config.app_name,
        work_dir = %config.work_dir.display(),
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    let service = Service::from_config(&config)?;

    match args.command {
        Command::Serve => {
            let shutdown = CancellationToken::new();
            let ctrlc_token = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("ctrl-c received, shutting down");
                    ctrlc_token.cancel();
                }
            });
            let state = ApiState {
                service: Arc::new(service),
                request_timeout: Duration::from_secs(config.server.request_timeout_seconds),
            };
            server::serve(state, &config.server.bind, shutdown).await?;
        }
        Command::Ingest { data_dir, reset } => {
            if reset {
                service.index().reset().await?;
                if let Some(graph) = service.graph() {
                    graph.clear().await?;
                }
                info!("stores cleared");
            }
            let report = service.ingest(data_dir.as_deref()).await?;
            println!("{}", to_json(&report)?);
        }
        Command::Ask { question, mode, top_k } => {
            let answer = service.answer(&question, mode, top_k).await?;
            println!("{}", answer.answer);
            for (i, s) in answer.sources.iter().enumerate() {
                println!("  [Source {}] {} ({:.3})", i + 1, s.source, s.score);
            }
            for (i, s) in answer.agent_steps.iter().enumerate() {
                println!("  step {} {}({})", i + 1, s.tool, s.input);
            }
        }
        Command::Graph { entity, max_hops } => {
            let Some(graph) = service.graph() else {
                return Err(AppError::Config("graph backend is disabled".into()));
            };
            let subgraph = graph.subgraph(&entity, max_hops, 200, 400).await?;
            if subgraph.is_not_found() {
                println!("entity '{entity}' not found");
            } else {
                println!("{}", to_json(&subgraph)?);
            }
        }
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value).map_err(|e| AppError::Server(format!("serialize output: {e}")))
}

// ── CLI ───────────────────────────────────────────────────────────────────────

enum Command {
    Serve,
    Ingest { data_dir: Option<PathBuf>, reset: bool },
    Ask { question: String, mode: QueryMode, top_k: usize },
    Graph { entity: String, max_hops: i64 },
}

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
    command: Command,
}

fn print_usage() {
    println!("Usage: docintel [OPTIONS] [COMMAND]");
    println!();
    println!("Commands:");
    println!("  serve                      Run the HTTP API (default)");
    println!("  ingest [DIR] [--reset]     Ingest documents (default: [ingest].data_dir)");
    println!("  ask [--agent] [-k N] Q...  Answer a question");
    println!("  graph ENTITY [HOPS]        Print the subgraph around an entity");
    println!();
    println!("Options:");
    println!("  -h, --help                 Print help");
    println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
    println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
}

fn fail(msg: &str) -> ! {
    eprintln!("error: {msg}");
    std::process::exit(2);
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;
    let mut positional: Vec<String> = Vec::new();
    let mut agent = false;
    let mut reset = false;
    let mut top_k = 5usize;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--" => {
                positional.extend(iter.by_ref());
                break;
            }
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "-f" | "--config" => match iter.next() {
                Some(path) => config_path = Some(path),
                None => fail("-f/--config requires a path argument"),
            },
            "--agent" => agent = true,
            "--reset" => reset = true,
            "-k" | "--top-k" => {
                top_k = match iter.next().and_then(|v| v.parse::<usize>().ok()) {
                    Some(k) if (1..=20).contains(&k) => k,
                    _ => fail("-k/--top-k requires a number between 1 and 20"),
                };
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            a if a.starts_with('-') && a.len() > 1 => fail(&format!("unknown option: {a}")),
            _ => positional.push(arg),
        }
    }

    let mut rest = positional.into_iter();
    let command = match rest.next().as_deref() {
        None | Some("serve") => Command::Serve,
        Some("ingest") => Command::Ingest { data_dir: rest.next().map(PathBuf::from), reset },
        Some("ask") => {
            let question = rest.collect::<Vec<_>>().join(" ");
            if question.trim().is_empty() {
                fail("ask requires a question");
            }
            let mode = if agent { QueryMode::Agent } else { QueryMode::Rag };
            Command::Ask { question, mode, top_k }
        }
        Some("graph") => {
            let Some(entity) = rest.next() else { fail("graph requires an entity name") };
            let max_hops = rest.next().and_then(|h| h.parse().ok()).unwrap_or(2);
            Command::Graph { entity, max_hops }
        }
        Some(other) => fail(&format!("unknown command: {other}")),
    };

    CliArgs { log_level: logger::level_for_verbosity(verbosity), config_path, command }
}
