//! Retrieval-augmented generation: hybrid retrieval, context assembly and the
//! single-shot `rag` answer mode.

pub mod context;
pub mod generator;
pub mod retriever;

pub use retriever::{GraphStatus, RetrievalError, RetrievalResult, retrieve};
