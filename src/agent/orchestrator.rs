//! Plan → execute → observe → synthesize, in a single linear pass.
//!
//! Per-step failures never abort a run: an unknown tool or a tool error
//! becomes that step's observation. Only the synthesis call can fail.

use serde::Serialize;
use tracing::info;

use super::AgentError;
use super::planner::decompose;
use super::tools::ToolRegistry;
use crate::llm::LlmProvider;
use crate::truncate_chars;

/// Plan steps beyond this are dropped.
pub const MAX_STEPS: usize = 8;
/// Observations are stored truncated to this many characters.
pub const OBSERVATION_CAP: usize = 2000;

const SYNTHESIS_TEMPERATURE: f32 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStep {
    pub thought: String,
    pub tool: String,
    pub input: String,
    pub observation: String,
}

#[derive(Debug, Clone)]
pub struct AgentRun {
    pub answer: String,
    pub steps: Vec<AgentStep>,
}

pub fn synthesis_prompt(question: &str, steps: &[AgentStep]) -> String {
    let observations = steps
        .iter()
        .enumerate()
        .map(|(i, s)| format!("Step {} ({}): {}\nResult: {}", i + 1, s.tool, s.thought, s.observation))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "You are an intelligent document assistant. Based on the observations collected during research,\n\
         provide a comprehensive answer to the user's question. Cite sources where applicable.\n\
         \n\
         Question: {question}\n\
         \n\
         Research steps and observations:\n\
         {observations}\n\
         \n\
         Provide a clear, well-structured answer:"
    )
}

pub async fn run_agent(
    llm: &LlmProvider,
    registry: &ToolRegistry,
    question: &str,
) -> Result<AgentRun, AgentError> {
    let plan = decompose(llm, question, &registry.describe()).await;

    let mut steps = Vec::with_capacity(plan.len().min(MAX_STEPS));
    for (i, step) in plan.into_iter().take(MAX_STEPS).enumerate() {
        info!(
            step = i + 1,
            tool = %step.tool,
            input = truncate_chars(&step.input, 50),
            reason = %step.reason,
            "agent step"
        );
        let observation = match registry.get(&step.tool) {
            None => format!("Unknown tool: {}", step.tool),
            Some(tool) => match tool.invoke(&step.input).await {
                Ok(text) => text,
                Err(e) => format!("Error: {e}"),
            },
        };
        steps.push(AgentStep {
            thought: step.reason,
            tool: step.tool,
            input: step.input,
            observation: truncate_chars(&observation, OBSERVATION_CAP).to_string(),
        });
    }

    let prompt = synthesis_prompt(question, &steps);
    let answer = llm
        .complete(&prompt, None, SYNTHESIS_TEMPERATURE)
        .await
        .map_err(AgentError::Synthesis)?;
    Ok(AgentRun { answer, steps })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesis_prompt_renders_steps() {
        let steps = vec![
            AgentStep { thought: "look".into(), tool: "search_documents".into(), input: "q".into(), observation: "A".into() },
            AgentStep { thought: "".into(), tool: "summarize".into(), input: "A".into(), observation: "B".into() },
        ];
        let p = synthesis_prompt("Q?", &steps);
        assert!(p.contains(
            "Research steps and observations:\nStep 1 (search_documents): look\nResult: A\n\n\
             Step 2 (summarize): \nResult: B\n\nProvide a clear, well-structured answer:"
        ));
        assert!(p.contains("Question: Q?\n"));
    }
}
