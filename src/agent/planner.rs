//! Query decomposition into tool steps.
//!
//! `decompose` never fails: a chat error or an unusable reply becomes the
//! single-step fallback plan (one direct document search).

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::tools::SEARCH_DOCUMENTS;
use crate::llm::{LlmProvider, json_object_span};

const DECOMPOSITION_PROMPT: &str = r#"You are a query planner. Given a user question, decompose it into a sequence of steps
that an AI agent should follow. Each step should use one of these tools:

Available tools:
{tool_descriptions}

Return ONLY valid JSON (no markdown, no explanation):
{
  "steps": [
    {"tool": "tool_name", "input": "what to pass to the tool", "reason": "why this step"}
  ]
}

If the question is simple and can be answered with a single search, use just one step.

Question: {question}
"#;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanStep {
    pub tool: String,
    pub input: String,
    pub reason: String,
}

pub type Plan = Vec<PlanStep>;

pub fn fallback_plan(question: &str) -> Plan {
    vec![PlanStep {
        tool: SEARCH_DOCUMENTS.to_string(),
        input: question.to_string(),
        reason: "direct search".to_string(),
    }]
}

pub fn build_prompt(question: &str, tool_descriptions: &str) -> String {
    DECOMPOSITION_PROMPT
        .replace("{tool_descriptions}", tool_descriptions)
        .replace("{question}", question)
}

pub async fn decompose(llm: &LlmProvider, question: &str, tool_descriptions: &str) -> Plan {
    let prompt = build_prompt(question, tool_descriptions);
    let plan = match llm.complete(&prompt, None, 0.0).await {
        Ok(reply) => parse_plan(&reply, question),
        Err(e) => {
            warn!(error = %e, "planner call failed, falling back to single search step");
            fallback_plan(question)
        }
    };
    info!(steps = plan.len(), "agent plan");
    plan
}

/// Parse a planner reply. Anything short of a JSON object with a `steps`
/// array yields the fallback plan; fields missing from a step take defaults.
pub fn parse_plan(reply: &str, question: &str) -> Plan {
    let parsed = json_object_span(reply).and_then(|span| serde_json::from_str::<Value>(span).ok());
    let Some(steps) = parsed.as_ref().and_then(|v| v.get("steps")).and_then(Value::as_array) else {
        warn!("failed to parse planner output, falling back to single search step");
        return fallback_plan(question);
    };

    steps
        .iter()
        .map(|step| {
            let field = |key: &str| step.get(key).and_then(Value::as_str).map(str::to_string);
            PlanStep {
                tool: field("tool").unwrap_or_else(|| SEARCH_DOCUMENTS.to_string()),
                input: field("input").unwrap_or_else(|| question.to_string()),
                reason: field("reason").unwrap_or_default(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::scripted::ScriptedProvider;

    #[test]
    fn parses_steps_inside_prose() {
        let reply = r#"Here you go:
```json
{"steps": [
  {"tool": "query_knowledge_graph", "input": "GDPR", "reason": "find related"},
  {"tool": "summarize", "input": "text"}
]}
```"#;
        let plan = parse_plan(reply, "q");
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].tool, "query_knowledge_graph");
        assert_eq!(plan[1].reason, "");
    }

    #[test]
    fn missing_fields_default() {
        let plan = parse_plan(r#"{"steps":[{}]}"#, "what is x?");
        assert_eq!(
            plan,
            vec![PlanStep { tool: "search_documents".into(), input: "what is x?".into(), reason: String::new() }]
        );
    }

    #[test]
    fn garbage_falls_back() {
        for reply in ["not json at all", "{broken", r#"{"plan": []}"#, r#"{"steps": "one"}"#] {
            assert_eq!(parse_plan(reply, "q"), fallback_plan("q"), "{reply}");
        }
    }

    #[tokio::test]
    async fn chat_failure_falls_back() {
        let llm = LlmProvider::Scripted(ScriptedProvider::new().fail("connection refused"));
        assert_eq!(decompose(&llm, "q", "- t: d").await, fallback_plan("q"));
    }

    #[tokio::test]
    async fn prompt_lists_tools_and_runs_cold() {
        let scripted = ScriptedProvider::new().reply(r#"{"steps":[]}"#);
        let llm = LlmProvider::Scripted(scripted.clone());
        let plan = decompose(&llm, "Who owns payroll?", "- search_documents: Search.").await;
        assert!(plan.is_empty());
        let call = &scripted.calls()[0];
        assert_eq!(call.temperature, 0.0);
        assert!(call.content.contains("Available tools:\n- search_documents: Search.\n"));
        assert!(call.content.contains("Question: Who owns payroll?"));
    }
}
