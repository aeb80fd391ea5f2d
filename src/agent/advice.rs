//! Advice Handler
//!
//! Answers strategy and how-to questions with the language model, grounded
//! in a fixed knowledge preamble and the recent advice conversation.

use crate::error::AssistantError;
use crate::locale::{apology, LanguageDetector};
use crate::llm::LanguageModel;
use crate::memory::{ConversationMemory, Speaker};
use crate::models::{ChatMessage, LlmInput};
use crate::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Recent turns replayed to the model with every question
pub const DEFAULT_HISTORY_TURNS: usize = 6;

/// Business knowledge sent as the system message of every advice call.
/// Loaded once and shared by every session.
#[derive(Debug, Clone)]
pub struct KnowledgePreamble(Arc<str>);

impl KnowledgePreamble {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            AssistantError::Config(format!(
                "Cannot read knowledge preamble {}: {}",
                path.display(),
                e
            ))
        })?;

        let preamble = Self::from_text(text)?;
        info!(path = %path.display(), chars = preamble.len(), "Loaded knowledge preamble");
        Ok(preamble)
    }

    pub fn from_text(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(AssistantError::Config(
                "Knowledge preamble is empty".to_string(),
            ));
        }
        Ok(Self(Arc::from(text.trim())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub struct AdviceHandler {
    model: Arc<dyn LanguageModel>,
    preamble: KnowledgePreamble,
    memory: ConversationMemory,
    language: LanguageDetector,
    history_turns: usize,
}

impl AdviceHandler {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        preamble: KnowledgePreamble,
        memory: ConversationMemory,
        language: LanguageDetector,
    ) -> Self {
        Self {
            model,
            preamble,
            memory,
            language,
            history_turns: DEFAULT_HISTORY_TURNS,
        }
    }

    pub fn with_history_turns(mut self, turns: usize) -> Self {
        self.history_turns = turns;
        self
    }

    pub async fn handle(&mut self, question: &str) -> String {
        let turn = self.memory.exchange_count() + 1;
        info!(turn, "Processing advice query");

        let messages = self.build_messages(question);

        match self.model.invoke(LlmInput::Messages(messages)).await {
            Ok(answer) => {
                self.memory.append(question, &answer).await;
                info!(turn, "Advice query completed");
                answer
            }
            Err(e) => {
                error!(turn, "Advice query failed: {}", e);
                apology(self.language.detect(question), &e.to_string())
            }
        }
    }

    /// Preamble, then recent history, then the new question
    fn build_messages(&self, question: &str) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(self.preamble.as_str())];

        messages.extend(self.memory.recent_turns(self.history_turns).map(|t| {
            match t.speaker {
                Speaker::User => ChatMessage::user(t.content.as_str()),
                Speaker::Agent => ChatMessage::assistant(t.content.as_str()),
            }
        }));

        messages.push(ChatMessage::user(question));
        messages
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn clear_memory(&mut self) {
        self.memory.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ContextConfig;
    use crate::llm::MockLanguageModel;
    use crate::models::ChatRole;

    fn handler(model: Arc<MockLanguageModel>) -> AdviceHandler {
        AdviceHandler::new(
            model.clone(),
            KnowledgePreamble::from_text("Anda adalah konsultan UMKM.").unwrap(),
            ConversationMemory::new("advice", ContextConfig::default(), model),
            LanguageDetector::default(),
        )
    }

    fn messages_of(input: &LlmInput) -> Vec<ChatMessage> {
        match input {
            LlmInput::Messages(messages) => messages.clone(),
            LlmInput::Prompt(_) => panic!("expected role-tagged messages"),
        }
    }

    #[tokio::test]
    async fn test_first_question_layout() {
        let model = Arc::new(MockLanguageModel::replying("Gunakan media sosial."));
        let mut handler = handler(model.clone());

        let answer = handler.handle("Bagaimana cara promosi?").await;
        assert_eq!(answer, "Gunakan media sosial.");

        let messages = messages_of(&model.calls()[0]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[0].content, "Anda adalah konsultan UMKM.");
        assert_eq!(messages[1], ChatMessage::user("Bagaimana cara promosi?"));
        assert_eq!(handler.memory().exchange_count(), 1);
    }

    #[tokio::test]
    async fn test_history_is_bounded_to_recent_turns() {
        let model = Arc::new(MockLanguageModel::replying("ok"));
        let mut handler = handler(model.clone());

        for i in 0..5 {
            handler.handle(&format!("pertanyaan {}", i)).await;
        }
        handler.handle("terakhir").await;

        let messages = messages_of(&model.calls()[5]);
        // system + 6 history turns + question
        assert_eq!(messages.len(), 8);
        assert_eq!(messages[1], ChatMessage::user("pertanyaan 2"));
        assert_eq!(messages[2], ChatMessage::assistant("ok"));
        assert_eq!(messages[6], ChatMessage::assistant("ok"));
        assert_eq!(messages[7], ChatMessage::user("terakhir"));
    }

    #[tokio::test]
    async fn test_reply_is_returned_verbatim() {
        let model = Arc::new(MockLanguageModel::replying("  **Tips:**\n1. Diskon\n"));
        let mut handler = handler(model);
        assert_eq!(handler.handle("tips").await, "  **Tips:**\n1. Diskon\n");
    }

    #[tokio::test]
    async fn test_model_failure_returns_apology() {
        let model = Arc::new(MockLanguageModel::new().then_fail("quota exceeded"));
        let mut handler = handler(model);

        let answer = handler.handle("How to improve customer service?").await;
        assert!(answer.starts_with("Sorry"));
        assert!(answer.contains("quota exceeded"));
        assert_eq!(handler.memory().turn_count(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_model_apology_hides_api_key() {
        let model = Arc::new(
            crate::llm::GeminiClient::new("SECRET-KEY-123", crate::llm::gemini::DEFAULT_MODEL)
                .unwrap()
                .with_base_url("http://127.0.0.1:1/v1beta/models"),
        );
        let mut handler = AdviceHandler::new(
            model.clone(),
            KnowledgePreamble::from_text("Konteks").unwrap(),
            ConversationMemory::new("advice", ContextConfig::default(), model),
            LanguageDetector::default(),
        );

        let answer = handler.handle("Tips promosi?").await;
        assert!(answer.starts_with("Sorry") || answer.starts_with("Maaf"), "{}", answer);
        assert!(!answer.contains("SECRET-KEY-123"), "{}", answer);
        assert_eq!(handler.memory().turn_count(), 0);
    }

    #[test]
    fn test_preamble_loading() {
        assert!(matches!(
            KnowledgePreamble::load("/nonexistent/base_context.txt"),
            Err(AssistantError::Config(_))
        ));
        assert!(matches!(
            KnowledgePreamble::from_text("  \n"),
            Err(AssistantError::Config(_))
        ));

        let path = std::env::temp_dir().join(format!("preamble-{}.txt", uuid::Uuid::new_v4()));
        std::fs::write(&path, "Konteks bisnis\n").unwrap();
        let preamble = KnowledgePreamble::load(&path).unwrap();
        assert_eq!(preamble.as_str(), "Konteks bisnis");
        std::fs::remove_file(&path).unwrap();
    }
}
