//! Prompt context assembly with numbered source attribution.

use super::retriever::RetrievalResult;

/// Render retrieval results as `[Source N: ...]` blocks followed by the graph
/// context (if any). Numbering starts at 1 and matches `sources` order in the
/// query response.
pub fn build_context(retrieval: &RetrievalResult) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !retrieval.vector_results.is_empty() {
        parts.push("## Retrieved Documents\n".to_string());
        for (i, result) in retrieval.vector_results.iter().enumerate() {
            parts.push(format!("[Source {}: {} (relevance: {:.3})]", i + 1, result.source(), result.score));
            parts.push(result.text.clone());
            parts.push(String::new());
        }
    }
    if !retrieval.graph_context.is_empty() {
        parts.push(format!("## {}", retrieval.graph_context));
    }
    parts.join("\n")
}

pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You are an intelligent document assistant. Answer the question based on the provided context.\n\
         Always cite your sources using [Source N] notation. If the context doesn't contain enough\n\
         information to answer, say so clearly.\n\
         \n\
         {context}\n\
         \n\
         ---\n\
         Question: {question}\n\
         \n\
         Answer:"
    )
}
