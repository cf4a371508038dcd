//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after the effective level is known
//! (CLI `-v` flags > `DOCINTEL_LOG_LEVEL` > config file).

use std::path::Path;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::error::AppError;

/// Install the global tracing subscriber.
///
/// With `prefer_level = true` the given level wins and `RUST_LOG` is only a
/// fallback for an unparsable level. With `prefer_level = false` `RUST_LOG`
/// wins when set. Output goes to stderr unless `log_file` is given, in which
/// case the file is opened in append mode.
pub fn init(level: &str, prefer_level: bool, log_file: Option<&Path>) -> Result<(), AppError> {
    let filter = build_filter(level, prefer_level)?;

    let writer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    AppError::Logger(format!("failed to open log file '{}': {e}", path.display()))
                })?;
            BoxMakeWriter::new(file)
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

fn build_filter(level: &str, prefer_level: bool) -> Result<EnvFilter, AppError> {
    if prefer_level {
        return EnvFilter::try_new(level).or_else(|level_err| {
            EnvFilter::try_from_default_env().map_err(|env_err| {
                AppError::Logger(format!(
                    "invalid log level '{level}': {level_err}; RUST_LOG parse failed: {env_err}"
                ))
            })
        });
    }
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}")))
}

/// Map repeated `-v` flags to a level: 1 → warn, 2 → info, 3 → debug, 4+ → trace.
pub fn level_for_verbosity(count: u8) -> Option<&'static str> {
    match count {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    }
}

/// Validate a level string, e.g. one coming from config.
pub fn parse_level(level: &str) -> Result<LevelFilter, AppError> {
    if level.is_empty() {
        return Err(AppError::Logger("log level must not be empty".into()));
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| AppError::Logger(format!("unrecognised log level: '{level}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_levels_parse() {
        for l in &["error", "warn", "info", "debug", "trace"] {
            assert!(parse_level(l).is_ok(), "expected '{l}' to be valid");
        }
    }

    #[test]
    fn invalid_level_errors() {
        assert!(parse_level("verbose").is_err());
        assert!(parse_level("").is_err());
    }

    #[test]
    fn verbosity_ladder() {
        assert_eq!(level_for_verbosity(0), None);
        assert_eq!(level_for_verbosity(1), Some("warn"));
        assert_eq!(level_for_verbosity(3), Some("debug"));
        assert_eq!(level_for_verbosity(9), Some("trace"));
    }

    #[test]
    fn init_succeeds_or_already_init() {
        // Another test in this process may have installed a subscriber first.
        match init("info", false, None) {
            Ok(()) => {}
            Err(AppError::Logger(msg)) if msg.contains("set subscriber") => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
