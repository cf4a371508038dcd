//! Scripted provider: replays a queue of canned replies (or failures) in
//! order and records every request it receives.
//!
//! Test double for the planner, tools and synthesis; public so the
//! integration tests under `tests/` can use it. Clones share the same queue
//! and call log.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::llm::ProviderError;

/// One request as seen by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub content: String,
    pub system: Option<String>,
    pub temperature: f32,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    replies: Arc<Mutex<VecDeque<Result<String, String>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    /// Queue a failure; the call returns `ProviderError::Request(message)`.
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    fn push(&self, item: Result<String, String>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(item);
        }
    }

    pub fn complete(
        &self,
        content: &str,
        system: Option<&str>,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                content: content.to_string(),
                system: system.map(str::to_string),
                temperature,
            });
        }
        let next = self
            .replies
            .lock()
            .map_err(|_| ProviderError::Request("scripted provider poisoned".into()))?
            .pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(ProviderError::Request(message)),
            None => Err(ProviderError::Request("scripted provider has no replies left".into())),
        }
    }

    /// Snapshot of every request received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|q| q.len()).unwrap_or(0)
    }
}
