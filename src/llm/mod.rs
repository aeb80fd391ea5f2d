//! Language model capability
//!
//! Every model call in the crate (fallback classification, summarization,
//! insights, advice) goes through [`LanguageModel`], so backends can be
//! swapped without touching the router or the handlers.

use crate::error::AssistantError;
use crate::models::LlmInput;
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

pub mod gemini;
pub use gemini::GeminiClient;

/// Trait for text generation
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a bare prompt or a role-tagged conversation
    async fn invoke(&self, input: LlmInput) -> Result<String>;
}

/// Scripted model for development & testing.
///
/// Replies are served in order; once the script runs out the fallback reply
/// is returned. Every input is recorded.
pub struct MockLanguageModel {
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    fallback: Option<String>,
    calls: Mutex<Vec<LlmInput>>,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with the same reply
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            fallback: Some(reply.into()),
            ..Self::new()
        }
    }

    /// Fail every call
    pub fn failing() -> Self {
        Self::new()
    }

    pub fn then_reply(self, reply: impl Into<String>) -> Self {
        self.push(Ok(reply.into()));
        self
    }

    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    fn push(&self, item: std::result::Result<String, String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(item);
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<LlmInput> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn invoke(&self, input: LlmInput) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(input);
        }

        let scripted = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front());

        match scripted {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(AssistantError::Llm(message)),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| AssistantError::Llm("mock model has no reply".to_string())),
        }
    }
}
