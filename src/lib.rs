//! docintel: question answering over a private document corpus with hybrid
//! vector/graph retrieval and a planning agent.
//!
//! The binary in `main.rs` wires these modules together; integration tests
//! use them directly.

pub mod agent;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod llm;
pub mod logger;
pub mod rag;
pub mod server;
pub mod service;
pub mod vectorstore;

/// Longest prefix of `s` with at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::truncate_chars;

    #[test]
    fn truncate_on_char_boundary() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
