//! Text chunking.
//!
//! Two strategies:
//! - `fixed`: character windows of `chunk_size`, advancing by
//!   `chunk_size - overlap`.
//! - `recursive`: greedy packing on a separator hierarchy (paragraph, line,
//!   sentence, word, character) via `text_splitter`.
//!
//! Sizes are counted in characters, not bytes.

use sha2::{Digest, Sha256};
use text_splitter::{ChunkConfig, TextSplitter};
use thiserror::Error;

use super::loader::Document;
use crate::vectorstore::Metadata;

#[derive(Debug, Error, PartialEq)]
pub enum ChunkError {
    #[error("invalid chunking argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Fixed,
    Recursive,
}

impl Strategy {
    pub fn parse(value: &str) -> Result<Self, ChunkError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "recursive" => Ok(Self::Recursive),
            other => Err(ChunkError::InvalidArgument(format!("unknown chunking strategy: {other}"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Recursive => "recursive",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

/// Validate sizes and return the effective overlap (capped at `chunk_size - 1`
/// so the window always advances).
fn normalize(chunk_size: i64, overlap: i64) -> Result<(usize, usize), ChunkError> {
    if chunk_size <= 0 {
        return Err(ChunkError::InvalidArgument("chunk_size must be > 0".into()));
    }
    if overlap < 0 {
        return Err(ChunkError::InvalidArgument("overlap must be >= 0".into()));
    }
    let size = chunk_size as usize;
    Ok((size, (overlap as usize).min(size - 1)))
}

/// Split `text`; every chunk carries `metadata` plus `chunk_index` and
/// `strategy`. Whitespace-only pieces are dropped and do not consume an index.
pub fn chunk_text(
    text: &str,
    strategy: Strategy,
    chunk_size: i64,
    overlap: i64,
    metadata: &Metadata,
) -> Result<Vec<Chunk>, ChunkError> {
    let (size, overlap) = normalize(chunk_size, overlap)?;
    let pieces: Vec<&str> = match strategy {
        Strategy::Fixed => fixed_windows(text, size, overlap),
        Strategy::Recursive => {
            let config = ChunkConfig::new(size)
                .with_overlap(overlap)
                .map_err(|e| ChunkError::InvalidArgument(e.to_string()))?;
            TextSplitter::new(config).chunks(text).collect()
        }
    };

    let source = metadata.get("source").and_then(|v| v.as_str()).unwrap_or("unknown");
    let chunks = pieces
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .enumerate()
        .map(|(index, piece)| {
            let mut meta = metadata.clone();
            meta.insert("chunk_index".into(), index.into());
            meta.insert("strategy".into(), strategy.as_str().into());
            Chunk { id: chunk_id(source, index, piece), text: piece.to_string(), metadata: meta }
        })
        .collect();
    Ok(chunks)
}

/// Chunk every document with the same settings, preserving document order.
pub fn chunk_documents(
    docs: &[Document],
    strategy: Strategy,
    chunk_size: i64,
    overlap: i64,
) -> Result<Vec<Chunk>, ChunkError> {
    let mut out = Vec::new();
    for doc in docs {
        out.extend(chunk_text(&doc.content, strategy, chunk_size, overlap, &doc.metadata)?);
    }
    Ok(out)
}

/// Stable chunk id: `chunk_` + 16 hex chars of SHA-256(`source|index|text`).
pub fn chunk_id(source: &str, chunk_index: usize, text: &str) -> String {
    let digest = Sha256::digest(format!("{source}|{chunk_index}|{text}").as_bytes());
    let hex = hex::encode(digest);
    format!("chunk_{}", &hex[..16])
}

fn fixed_windows(text: &str, size: usize, overlap: usize) -> Vec<&str> {
    // Byte offset of every char, plus the end, so windows slice on boundaries.
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let char_count = bounds.len();
    bounds.push(text.len());

    let step = size - overlap;
    let mut out = Vec::new();
    let mut start = 0;
    while start < char_count {
        let end = (start + size).min(char_count);
        out.push(&text[bounds[start]..bounds[end]]);
        start += step;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(source: &str) -> Metadata {
        let mut m = Metadata::new();
        m.insert("source".into(), source.into());
        m
    }

    #[test]
    fn invalid_arguments_rejected() {
        let m = meta("a");
        assert!(matches!(chunk_text("abc", Strategy::Fixed, 0, 0, &m), Err(ChunkError::InvalidArgument(_))));
        assert!(matches!(chunk_text("abc", Strategy::Fixed, -3, 0, &m), Err(ChunkError::InvalidArgument(_))));
        assert!(matches!(chunk_text("abc", Strategy::Recursive, 10, -1, &m), Err(ChunkError::InvalidArgument(_))));
    }

    #[test]
    fn fixed_windows_overlap_exactly() {
        let text: String = ('a'..='z').collect();
        let chunks = chunk_text(&text, Strategy::Fixed, 10, 3, &meta("abc.txt")).unwrap();
        for c in &chunks {
            assert!(c.text.chars().count() <= 10);
        }
        for pair in chunks.windows(2) {
            let (a, b) = (&pair[0].text, &pair[1].text);
            if a.chars().count() == 10 {
                let tail: String = a.chars().skip(7).collect();
                let head: String = b.chars().take(3).collect();
                assert_eq!(tail, head);
            }
        }
        assert_eq!(chunks[0].text, "abcdefghij");
        assert_eq!(chunks[1].text, "hijklmnopq");
    }

    #[test]
    fn overlap_clamped_below_size() {
        let chunks = chunk_text("abcdef", Strategy::Fixed, 3, 10, &meta("x")).unwrap();
        // step 1: one window per char
        assert_eq!(chunks.len(), 6);
        assert_eq!(chunks[0].text, "abc");
        assert_eq!(chunks[5].text, "f");
    }

    #[test]
    fn fixed_handles_multibyte() {
        let chunks = chunk_text("ééééé", Strategy::Fixed, 2, 0, &meta("x")).unwrap();
        assert_eq!(chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(), vec!["éé", "éé", "é"]);
    }

    #[test]
    fn blank_windows_skipped_and_indices_dense() {
        let text = format!("abc{}def", " ".repeat(6));
        let chunks = chunk_text(&text, Strategy::Fixed, 3, 0, &meta("x")).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].metadata["chunk_index"], 1);
        assert_eq!(chunks[1].metadata["strategy"], "fixed");
    }

    #[test]
    fn recursive_respects_size_and_keeps_metadata() {
        let text = "First paragraph about retention.\n\nSecond paragraph about access control. \
                    It has two sentences.\n\nThird.";
        let chunks = chunk_text(text, Strategy::Recursive, 40, 0, &meta("policy.md")).unwrap();
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert!(c.text.chars().count() <= 40, "{:?}", c.text);
            assert_eq!(c.metadata["chunk_index"], i);
            assert_eq!(c.metadata["source"], "policy.md");
            assert_eq!(c.metadata["strategy"], "recursive");
        }
    }

    #[test]
    fn chunk_ids_are_stable_and_distinct() {
        let a = chunk_id("doc.md", 0, "hello");
        assert_eq!(a, chunk_id("doc.md", 0, "hello"));
        assert_ne!(a, chunk_id("doc.md", 1, "hello"));
        assert_ne!(a, chunk_id("other.md", 0, "hello"));
        assert!(a.starts_with("chunk_"));
        assert_eq!(a.len(), "chunk_".len() + 16);
    }

    #[test]
    fn strategy_parse() {
        assert_eq!(Strategy::parse("Fixed").unwrap(), Strategy::Fixed);
        assert!(Strategy::parse("semantic").is_err());
    }
}
