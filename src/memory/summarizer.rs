//! Context Summarization
//!
//! Folds the oldest turns, together with the running summary, into a new
//! summary when a memory goes over its token budget.

use crate::error::AssistantError;
use crate::llm::LanguageModel;
use crate::memory::store::{Speaker, Turn};
use crate::models::LlmInput;
use std::sync::Arc;
use tracing::{info, warn};

/// Summarizes conversation context with a language model
#[derive(Clone)]
pub struct ContextSummarizer {
    model: Arc<dyn LanguageModel>,
}

impl ContextSummarizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Produce a replacement summary covering `previous_summary` and `turns`.
    pub async fn summarize(&self, previous_summary: &str, turns: &[Turn]) -> crate::Result<String> {
        if turns.is_empty() {
            return Err(AssistantError::Summarization(
                "Cannot summarize empty turn list".to_string(),
            ));
        }

        let prompt = build_summary_prompt(previous_summary, &format_turns_for_summary(turns));

        info!("Summarizing {} turns into running summary", turns.len());

        let summary = self
            .model
            .invoke(LlmInput::Prompt(prompt))
            .await
            .map_err(|e| {
                warn!("Failed to summarize context: {}", e);
                AssistantError::Summarization(e.to_string())
            })?;

        let summary = summary.trim().to_string();
        if summary.is_empty() {
            return Err(AssistantError::Summarization(
                "model returned an empty summary".to_string(),
            ));
        }

        Ok(summary)
    }
}

/// Format turns into readable text for summarization
fn format_turns_for_summary(turns: &[Turn]) -> String {
    let mut text = String::new();

    for turn in turns {
        let speaker = match turn.speaker {
            Speaker::User => "User",
            Speaker::Agent => "Assistant",
        };
        text.push_str(&format!("{}: {}\n", speaker, turn.content));
    }

    text
}

fn build_summary_prompt(previous_summary: &str, transcript: &str) -> String {
    let previous = if previous_summary.trim().is_empty() {
        "(none yet)"
    } else {
        previous_summary.trim()
    };

    format!(
        r#"Progressively summarize the conversation between a small-business owner and their assistant.
Extend the current summary with the new lines and return ONE updated summary.

Keep:
1. Business units, products and periods that were asked about
2. Figures that were reported (keep the exact numbers)
3. Advice or recommendations that were given
4. Open questions the owner still has

Write in the language the conversation uses. Be concise.

CURRENT SUMMARY:
{}

NEW LINES:
---
{}---

UPDATED SUMMARY:"#,
        previous, transcript
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLanguageModel;

    #[test]
    fn test_format_turns_for_summary() {
        let turns = vec![
            Turn::user("Berapa omzet Warung Kopi Gembira?"),
            Turn::agent("Omzet bulan Juni Rp 12.500.000"),
        ];

        let formatted = format_turns_for_summary(&turns);
        assert!(formatted.contains("User: Berapa omzet"));
        assert!(formatted.contains("Assistant: Omzet bulan Juni"));
    }

    #[test]
    fn test_prompt_carries_previous_summary() {
        let prompt = build_summary_prompt("Owner asked about June sales.", "User: hi\n");
        assert!(prompt.contains("CURRENT SUMMARY:\nOwner asked about June sales."));

        let first = build_summary_prompt("  ", "User: hi\n");
        assert!(first.contains("(none yet)"));
    }

    #[tokio::test]
    async fn test_summarize_trims_reply() {
        let model = Arc::new(MockLanguageModel::replying("  June sales were discussed.\n"));
        let summarizer = ContextSummarizer::new(model.clone());

        let summary = summarizer
            .summarize("", &[Turn::user("q"), Turn::agent("a")])
            .await
            .unwrap();
        assert_eq!(summary, "June sales were discussed.");
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_summarize_rejects_empty_input_and_reply() {
        let model = Arc::new(MockLanguageModel::replying("   "));
        let summarizer = ContextSummarizer::new(model.clone());

        assert!(summarizer.summarize("", &[]).await.is_err());
        assert!(summarizer.summarize("", &[Turn::user("q")]).await.is_err());
        // Empty turn list never reaches the model
        assert_eq!(model.call_count(), 1);
    }
}
