//! Per-handler conversation memory
//!
//! Rolling turns plus a running summary, kept under a token ceiling. Each
//! handler owns exactly one instance; the data and advice conversations never
//! share one.

use crate::memory::context_manager::{fit_tokens, ContextConfig, ContextManager};
use crate::memory::store::{estimate_tokens, ConversationHistory, Turn};
use crate::memory::summarizer::ContextSummarizer;
use crate::llm::LanguageModel;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shown when a memory has no summary yet
pub const EMPTY_SUMMARY_PLACEHOLDER: &str = "Belum ada riwayat percakapan";

/// Read-only view of a memory
#[derive(Debug, Clone, Serialize)]
pub struct MemorySnapshot {
    pub summary: String,
    pub turns: Vec<Turn>,
    pub exchange_count: u64,
    pub compactions: u64,
    pub token_estimate: usize,
}

pub struct ConversationMemory {
    label: &'static str,
    history: ConversationHistory,
    summary: String,
    exchange_count: u64,
    compactions: u64,
    context_manager: ContextManager,
    summarizer: ContextSummarizer,
}

impl ConversationMemory {
    pub fn new(label: &'static str, config: ContextConfig, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            label,
            history: ConversationHistory::new(),
            summary: String::new(),
            exchange_count: 0,
            compactions: 0,
            context_manager: ContextManager::with_config(config),
            summarizer: ContextSummarizer::new(model),
        }
    }

    /// Record one exchange and compact if the budget is exceeded.
    pub async fn append(&mut self, user_text: &str, agent_text: &str) {
        self.history.add_turn(Turn::user(user_text));
        self.history.add_turn(Turn::agent(agent_text));
        self.exchange_count += 1;

        let summary_tokens = estimate_tokens(&self.summary);
        if self.context_manager.should_compact(&self.history, summary_tokens) {
            info!(
                memory = self.label,
                "Context at {}% - compacting older turns",
                self.context_manager.usage_percent(&self.history, summary_tokens) as u32
            );
            self.compact(summary_tokens).await;
        }
    }

    async fn compact(&mut self, summary_tokens: usize) {
        let count = self
            .context_manager
            .turns_to_compact(&self.history, summary_tokens);
        if count == 0 {
            return;
        }

        let oldest: Vec<Turn> = self.history.turns().take(count).cloned().collect();

        // Turns are only dropped once their content lives in the summary
        match self.summarizer.summarize(&self.summary, &oldest).await {
            Ok(summary) => {
                self.history.drain_oldest(count);
                let budget = self.context_manager.summary_budget(&self.history);
                if estimate_tokens(&summary) > budget {
                    warn!(memory = self.label, budget, "Summary over budget, truncating");
                }
                self.summary = fit_tokens(&summary, budget);
                self.compactions += 1;
                info!(
                    memory = self.label,
                    compacted = count,
                    remaining = self.history.len(),
                    "Compacted conversation into summary"
                );
            }
            Err(e) => {
                warn!(
                    memory = self.label,
                    "Compaction postponed, keeping {} turns: {}",
                    self.history.len(),
                    e
                );
            }
        }
    }

    /// The last `n` turns as prior-question / prior-answer lines.
    pub fn recent_context(&self, n: usize) -> String {
        self.context_manager.format_recent(&self.history, n)
    }

    /// Enrich a raw question with the summary and recent turns.
    pub fn build_prompt_context(&self, question: &str) -> String {
        let recent = self.recent_context(self.context_manager.config().context_turns);

        if self.summary.is_empty() && recent.is_empty() {
            return question.to_string();
        }

        let mut context = String::new();
        if !self.summary.is_empty() {
            context.push_str(&format!("CONVERSATION SUMMARY: {}\n\n", self.summary));
        }
        if !recent.is_empty() {
            context.push_str(&format!("RECENT CONVERSATION:\n{}\n\n", recent));
        }
        context.push_str(&format!("CURRENT QUESTION: {}", question));

        debug!(memory = self.label, chars = context.len(), "Built prompt context");
        context
    }

    /// The `n` most recent raw turns, oldest first
    pub fn recent_turns(&self, n: usize) -> impl Iterator<Item = &Turn> {
        self.history.recent(n)
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.summary.clear();
        self.exchange_count = 0;
        self.compactions = 0;
        info!(memory = self.label, "Conversation memory cleared");
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn summary_or_default(&self) -> &str {
        if self.summary.is_empty() {
            EMPTY_SUMMARY_PLACEHOLDER
        } else {
            &self.summary
        }
    }

    pub fn turn_count(&self) -> usize {
        self.history.len()
    }

    pub fn exchange_count(&self) -> u64 {
        self.exchange_count
    }

    pub fn compactions(&self) -> u64 {
        self.compactions
    }

    pub fn token_estimate(&self) -> usize {
        self.history.total_tokens() + estimate_tokens(&self.summary)
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            summary: self.summary.clone(),
            turns: self.history.turns().cloned().collect(),
            exchange_count: self.exchange_count,
            compactions: self.compactions,
            token_estimate: self.token_estimate(),
        }
    }
}
