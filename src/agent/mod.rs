//! Session orchestrator
//!
//! INPUT → CLASSIFY → DATA | ADVICE → ANSWER
//!
//! One orchestrator per user session. It owns the router and both handlers,
//! and each handler owns its own memory.

pub mod advice;
pub mod data;

pub use advice::{AdviceHandler, KnowledgePreamble};
pub use data::DataHandler;

use crate::memory::MemorySnapshot;
use crate::models::{Classification, Dispatch};
use crate::router::Router;
use serde::Serialize;
use tracing::info;

/// Both memories of one session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub data: MemorySnapshot,
    pub advice: MemorySnapshot,
}

pub struct SessionOrchestrator {
    router: Router,
    data: DataHandler,
    advice: AdviceHandler,
}

impl SessionOrchestrator {
    pub fn new(router: Router, data: DataHandler, advice: AdviceHandler) -> Self {
        Self {
            router,
            data,
            advice,
        }
    }

    /// Answer one message. Blank input yields an empty answer.
    pub async fn dispatch(&mut self, message: &str) -> String {
        self.dispatch_detailed(message)
            .await
            .map(|d| d.answer)
            .unwrap_or_default()
    }

    /// Like [`dispatch`](Self::dispatch) but also reports the route taken.
    /// `None` for blank input, which is neither classified nor answered.
    pub async fn dispatch_detailed(&mut self, message: &str) -> Option<Dispatch> {
        let message = message.trim();
        if message.is_empty() {
            return None;
        }

        let classification = self.router.classify(message).await;
        info!("Routing to {} handler", classification);

        let answer = match classification {
            Classification::Data => self.data.handle(message).await,
            Classification::Advice => self.advice.handle(message).await,
        };

        Some(Dispatch {
            classification,
            answer,
        })
    }

    /// Forget everything this session has seen
    pub fn reset(&mut self) {
        self.data.clear_memory();
        self.advice.clear_memory();
        self.router.clear_cache();
        info!("Session reset");
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            data: self.data.memory().snapshot(),
            advice: self.advice.memory().snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::KeywordScorer;
    use crate::llm::MockLanguageModel;
    use crate::locale::LanguageDetector;
    use crate::memory::{ContextConfig, ConversationMemory};
    use crate::query_engine::MockQueryEngine;
    use crate::verification::CompletenessVerifier;
    use std::sync::Arc;

    struct Fixture {
        orchestrator: SessionOrchestrator,
        router_model: Arc<MockLanguageModel>,
        engine: Arc<MockQueryEngine>,
        advice_model: Arc<MockLanguageModel>,
    }

    fn fixture(router_model: MockLanguageModel, engine: MockQueryEngine) -> Fixture {
        let router_model = Arc::new(router_model);
        let engine = Arc::new(engine);
        let data_model = Arc::new(MockLanguageModel::replying("Dari data yang saya lihat, stabil."));
        let advice_model = Arc::new(MockLanguageModel::replying("Coba program loyalitas."));

        let router = Router::new(KeywordScorer::default(), router_model.clone());
        let data = DataHandler::new(
            engine.clone(),
            data_model.clone(),
            ConversationMemory::new("data", ContextConfig::default(), data_model),
            CompletenessVerifier::default(),
            LanguageDetector::default(),
        );
        let advice = AdviceHandler::new(
            advice_model.clone(),
            KnowledgePreamble::from_text("Konteks UMKM").unwrap(),
            ConversationMemory::new("advice", ContextConfig::default(), advice_model.clone()),
            LanguageDetector::default(),
        );

        Fixture {
            orchestrator: SessionOrchestrator::new(router, data, advice),
            router_model,
            engine,
            advice_model,
        }
    }

    #[tokio::test]
    async fn test_data_question_goes_to_data_handler_only() {
        let mut f = fixture(
            MockLanguageModel::failing(),
            MockQueryEngine::new().then_reply("Rp 12.500.000"),
        );

        let dispatch = f
            .orchestrator
            .dispatch_detailed("Berapa penjualan warung kopi bulan ini?")
            .await
            .unwrap();

        assert_eq!(dispatch.classification, Classification::Data);
        assert_eq!(dispatch.answer, "Rp 12.500.000");
        assert_eq!(f.engine.call_count(), 1);
        assert_eq!(f.advice_model.call_count(), 0);
        assert_eq!(f.router_model.call_count(), 0);

        let snapshot = f.orchestrator.snapshot();
        assert_eq!(snapshot.data.exchange_count, 1);
        assert_eq!(snapshot.advice.exchange_count, 0);
    }

    #[tokio::test]
    async fn test_advice_question_goes_to_advice_handler_only() {
        let mut f = fixture(MockLanguageModel::failing(), MockQueryEngine::new());

        let answer = f.orchestrator.dispatch("Tips untuk meningkatkan penjualan").await;

        assert_eq!(answer, "Coba program loyalitas.");
        assert_eq!(f.engine.call_count(), 0);
        assert_eq!(f.orchestrator.snapshot().advice.exchange_count, 1);
        assert_eq!(f.orchestrator.snapshot().data.exchange_count, 0);
    }

    #[tokio::test]
    async fn test_blank_message_is_not_classified() {
        let mut f = fixture(MockLanguageModel::replying("DATA"), MockQueryEngine::new());

        assert_eq!(f.orchestrator.dispatch("   \n").await, "");
        assert!(f.orchestrator.dispatch_detailed("").await.is_none());
        assert_eq!(f.router_model.call_count(), 0);
        assert_eq!(f.engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_clears_memories_and_router_cache() {
        let mut f = fixture(
            MockLanguageModel::replying("ADVICE"),
            MockQueryEngine::new().then_reply("Rp 10"),
        );

        f.orchestrator.dispatch("Total omzet warung?").await;
        f.orchestrator.dispatch("Kapan toko ramai?").await;
        assert_eq!(f.router_model.call_count(), 1);

        f.orchestrator.reset();

        let snapshot = f.orchestrator.snapshot();
        assert!(snapshot.data.turns.is_empty());
        assert!(snapshot.advice.turns.is_empty());
        assert_eq!(snapshot.data.exchange_count, 0);

        // Cache was dropped, so the fallback is consulted again
        f.orchestrator.dispatch("Kapan toko ramai?").await;
        assert_eq!(f.router_model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_memories_stay_isolated() {
        let mut f = fixture(
            MockLanguageModel::failing(),
            MockQueryEngine::new().then_reply("Rp 10").then_reply("Rp 20"),
        );

        f.orchestrator.dispatch("Berapa omzet warung Juni?").await;
        f.orchestrator.dispatch("Saran promosi untuk toko sepi").await;
        f.orchestrator.dispatch("Berapa omzet warung Juli?").await;

        // The second data query sees only data history
        let inputs = f.engine.inputs();
        assert!(inputs[1].contains("Previous Q: Berapa omzet warung Juni?"));
        assert!(!inputs[1].contains("Saran promosi"));

        let snapshot = f.orchestrator.snapshot();
        assert_eq!(snapshot.data.exchange_count, 2);
        assert_eq!(snapshot.advice.exchange_count, 1);
    }
}
