//! Multi-step agent: a planner decomposes the question into tool steps, the
//! orchestrator runs them in order and synthesizes a cited answer.

pub mod orchestrator;
pub mod planner;
pub mod tools;

use thiserror::Error;

use crate::llm::ProviderError;

pub use orchestrator::{AgentRun, AgentStep, MAX_STEPS, run_agent};
pub use tools::{Tool, ToolRegistry};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("answer synthesis failed: {0}")]
    Synthesis(ProviderError),
}
