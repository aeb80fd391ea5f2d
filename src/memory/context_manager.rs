//! Context Window Management
//!
//! Decides when a history must be compacted, how much of it goes into the
//! summary, and how recent turns are rendered into a prompt.

use crate::memory::store::{ConversationHistory, Speaker};
use serde::{Deserialize, Serialize};

/// Configuration for context window management
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Token ceiling for turns plus summary
    pub max_context_tokens: usize,
    /// Turns kept verbatim after a compaction
    pub preserve_recent_turns: usize,
    /// Turns rendered into the prompt by `build_prompt_context`
    pub context_turns: usize,
    /// Per-turn character cap in rendered context
    pub max_turn_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 4000,
            preserve_recent_turns: 6,
            context_turns: 8,
            max_turn_chars: 200,
        }
    }
}

/// One question/answer exchange
const EXCHANGE: usize = 2;

/// Manages the context window of one memory
#[derive(Debug, Clone)]
pub struct ContextManager {
    config: ContextConfig,
}

impl ContextManager {
    pub fn new() -> Self {
        Self {
            config: ContextConfig::default(),
        }
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Turns plus summary are over the ceiling
    pub fn should_compact(&self, history: &ConversationHistory, summary_tokens: usize) -> bool {
        history.total_tokens() + summary_tokens > self.config.max_context_tokens
            && !history.is_empty()
    }

    /// Number of oldest turns to fold into the summary.
    ///
    /// Whole exchanges are taken until at most `preserve_recent_turns` remain
    /// and the budget is met. The latest exchange is kept unless it alone is
    /// over the ceiling.
    pub fn turns_to_compact(&self, history: &ConversationHistory, summary_tokens: usize) -> usize {
        let total = history.len();
        let mut remaining_tokens = history.total_tokens() + summary_tokens;
        let mut count = 0;

        while count < total
            && (total - count > self.config.preserve_recent_turns
                || remaining_tokens > self.config.max_context_tokens)
        {
            for index in count..(count + EXCHANGE).min(total) {
                if let Some(turn) = history.get(index) {
                    remaining_tokens = remaining_tokens.saturating_sub(turn.token_count);
                }
            }
            count = (count + EXCHANGE).min(total);
        }

        count
    }

    /// Render the last `count` turns as question/answer lines.
    pub fn format_recent(&self, history: &ConversationHistory, count: usize) -> String {
        let max_chars = self.config.max_turn_chars;
        let mut lines = Vec::new();
        let mut turns = history.recent(count).peekable();

        // A window that starts mid-exchange drops the orphaned answer
        if matches!(turns.peek(), Some(turn) if turn.speaker == Speaker::Agent) {
            turns.next();
        }

        for turn in turns {
            let label = match turn.speaker {
                Speaker::User => "Previous Q",
                Speaker::Agent => "Previous A",
            };
            lines.push(format!("{}: {}", label, truncate_chars(&turn.content, max_chars)));
        }

        lines.join("\n")
    }

    /// Token budget left for the summary once `history` is accounted for
    pub fn summary_budget(&self, history: &ConversationHistory) -> usize {
        self.config
            .max_context_tokens
            .saturating_sub(history.total_tokens())
    }

    pub fn usage_percent(&self, history: &ConversationHistory, summary_tokens: usize) -> f32 {
        ((history.total_tokens() + summary_tokens) as f32 / self.config.max_context_tokens as f32)
            * 100.0
    }
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Cut `text` so its token estimate stays within `max_tokens`
pub fn fit_tokens(text: &str, max_tokens: usize) -> String {
    let max_chars = max_tokens * 4;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars < 4 {
        return String::new();
    }
    truncate_chars(text, max_chars - 3)
}

/// Cut to `max_chars` characters, marking the cut with `...`
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::store::Turn;

    fn history_of(exchanges: usize, chars_per_turn: usize) -> ConversationHistory {
        let mut history = ConversationHistory::new();
        for i in 0..exchanges {
            history.add_turn(Turn::user(format!("{:0>width$}", i, width = chars_per_turn)));
            history.add_turn(Turn::agent("a".repeat(chars_per_turn)));
        }
        history
    }

    #[test]
    fn test_should_compact() {
        let manager = ContextManager::with_config(ContextConfig {
            max_context_tokens: 1000,
            ..ContextConfig::default()
        });

        // 4 exchanges x 2 turns x 100 tokens = 800
        let history = history_of(4, 400);
        assert!(!manager.should_compact(&history, 0));
        assert!(manager.should_compact(&history, 201));
    }

    #[test]
    fn test_turns_to_compact_respects_preserve_count() {
        let manager = ContextManager::with_config(ContextConfig {
            max_context_tokens: 1000,
            preserve_recent_turns: 6,
            ..ContextConfig::default()
        });

        let history = history_of(6, 400);
        assert_eq!(manager.turns_to_compact(&history, 0), 6);
    }

    #[test]
    fn test_oversized_last_exchange_is_compacted() {
        let manager = ContextManager::with_config(ContextConfig {
            max_context_tokens: 10,
            preserve_recent_turns: 6,
            ..ContextConfig::default()
        });

        // Every exchange alone is over budget
        let history = history_of(3, 400);
        assert_eq!(manager.turns_to_compact(&history, 0), 6);

        let single = history_of(1, 400);
        assert!(manager.should_compact(&single, 0));
        assert_eq!(manager.turns_to_compact(&single, 0), 2);
    }

    #[test]
    fn test_last_exchange_kept_when_it_fits() {
        let manager = ContextManager::with_config(ContextConfig {
            max_context_tokens: 250,
            preserve_recent_turns: 6,
            ..ContextConfig::default()
        });

        // 100 tokens per turn; the newest exchange alone fits
        let history = history_of(3, 400);
        assert_eq!(manager.turns_to_compact(&history, 0), 4);
        assert!(!manager.should_compact(&ConversationHistory::new(), 5000));
    }

    #[test]
    fn test_fit_tokens() {
        assert_eq!(fit_tokens("ringkas", 10), "ringkas");
        let cut = fit_tokens(&"x".repeat(100), 5);
        assert_eq!(cut.chars().count(), 20);
        assert!(cut.ends_with("..."));
        assert!(crate::memory::store::estimate_tokens(&cut) <= 5);
        assert_eq!(fit_tokens("panjang sekali", 0), "");
    }

    #[test]
    fn test_format_recent_truncates_each_side() {
        let manager = ContextManager::with_config(ContextConfig {
            max_turn_chars: 5,
            ..ContextConfig::default()
        });
        let mut history = ConversationHistory::new();
        history.add_turn(Turn::user("omzet bulan ini?"));
        history.add_turn(Turn::agent("Rp 10"));

        let rendered = manager.format_recent(&history, 8);
        assert_eq!(rendered, "Previous Q: omzet...\nPrevious A: Rp 10");
    }

    #[test]
    fn test_format_recent_skips_orphaned_answer() {
        let manager = ContextManager::new();
        let history = history_of(2, 3);

        let rendered = manager.format_recent(&history, 3);
        assert!(rendered.starts_with("Previous Q: 001"));
        assert_eq!(rendered.lines().count(), 2);
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé...");
        assert_eq!(truncate_chars("héllo", 5), "héllo");
        assert_eq!(truncate_chars("", 3), "");
    }
}
