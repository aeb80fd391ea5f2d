//! Query Router
//!
//! Decides, per question, whether it goes to the data handler or the advice
//! handler. Keyword tiers are tried first; the language model is only asked
//! when no keyword fires. Classification never fails: every internal error
//! lands on ADVICE.

use crate::classifier::KeywordScorer;
use crate::llm::LanguageModel;
use crate::models::{Classification, LlmInput};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Verdict of the model-based last resort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackVerdict {
    /// The model answered with a valid label
    Parsed(Classification),
    /// The model answered something else; ADVICE by default
    Unrecognized,
    /// The model call failed; ADVICE by default
    Failed,
}

impl FallbackVerdict {
    pub fn classification(self) -> Classification {
        match self {
            FallbackVerdict::Parsed(c) => c,
            FallbackVerdict::Unrecognized | FallbackVerdict::Failed => Classification::Advice,
        }
    }
}

/// Model-based classifier used only when keyword scoring is inconclusive
pub struct FallbackClassifier {
    model: Arc<dyn LanguageModel>,
}

impl FallbackClassifier {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn classify(&self, question: &str) -> FallbackVerdict {
        let prompt = build_fallback_prompt(question);

        match self.model.invoke(LlmInput::Prompt(prompt)).await {
            Ok(reply) => match Classification::from_label(&reply) {
                Some(classification) => {
                    info!("LLM classification: {}", classification);
                    FallbackVerdict::Parsed(classification)
                }
                None => {
                    warn!("Unrecognized LLM classification {:?}, defaulting to ADVICE", reply.trim());
                    FallbackVerdict::Unrecognized
                }
            },
            Err(e) => {
                error!("LLM classification error, defaulting to ADVICE: {}", e);
                FallbackVerdict::Failed
            }
        }
    }
}

fn build_fallback_prompt(question: &str) -> String {
    format!(
        r#"Classify this question as "DATA" or "ADVICE".

DATA = questions that need specific figures from the business records:
- Sales numbers, revenue, profit
- Product performance, stock levels
- Transaction counts, payment methods
- Performance metrics of a specific business unit
- Time-based analysis (daily, monthly, yearly trends)
- Comparisons between business units or products

ADVICE = questions about general business guidance:
- Tips for improving a business
- General strategies and recommendations
- How-to guidance that needs no specific data
- General business concepts and best practices

Examples:
DATA: "Berapa penjualan warung kopi bulan ini?" (needs sales data)
DATA: "What are my top selling products?" (needs product data)
ADVICE: "Tips untuk meningkatkan penjualan" (general advice)
ADVICE: "How to improve customer service?" (general strategy)

Question: {}

Answer only "DATA" or "ADVICE":"#,
        question
    )
}

/// Fallback verdicts remembered per session
pub const DEFAULT_CACHE_LIMIT: usize = 256;

/// Keyword tiers plus model fallback
pub struct Router {
    scorer: KeywordScorer,
    fallback: FallbackClassifier,
    /// Fallback verdicts for this session, keyed by normalized question
    cache: HashMap<String, Classification>,
    /// Insertion order of `cache`, oldest first
    cache_order: VecDeque<String>,
    cache_limit: usize,
}

impl Router {
    pub fn new(scorer: KeywordScorer, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            scorer,
            fallback: FallbackClassifier::new(model),
            cache: HashMap::new(),
            cache_order: VecDeque::new(),
            cache_limit: DEFAULT_CACHE_LIMIT,
        }
    }

    pub fn with_cache_limit(mut self, limit: usize) -> Self {
        self.cache_limit = limit;
        self
    }

    /// Route a question. Tiers are evaluated in order; first match wins.
    pub async fn classify(&mut self, question: &str) -> Classification {
        let data_score = self.scorer.score_data(question);
        let advice_score = self.scorer.score_advice(question);

        debug!(data_score, advice_score, "Keyword scores");

        // Financial figures must never be silently turned into generic advice
        if data_score >= 2 {
            info!("Classification: DATA (score: {})", data_score);
            return Classification::Data;
        }
        if advice_score >= 1 {
            info!("Classification: ADVICE (score: {})", advice_score);
            return Classification::Advice;
        }
        if data_score > 0 {
            info!("Classification: DATA (weak score: {})", data_score);
            return Classification::Data;
        }

        let key = normalize_question(question);
        if let Some(cached) = self.cache.get(&key) {
            debug!("Classification: {} (cached fallback)", cached);
            return *cached;
        }

        info!("No keyword signal, asking the fallback classifier");
        let verdict = self.fallback.classify(question).await;
        if let FallbackVerdict::Parsed(classification) = verdict {
            self.remember(key, classification);
        }
        verdict.classification()
    }

    /// Cache a verdict, evicting the oldest once the limit is reached
    fn remember(&mut self, key: String, classification: Classification) {
        if self.cache_limit == 0 {
            return;
        }
        while self.cache.len() >= self.cache_limit {
            let Some(oldest) = self.cache_order.pop_front() else {
                break;
            };
            self.cache.remove(&oldest);
            debug!("Evicted cached fallback verdict");
        }
        self.cache_order.push_back(key.clone());
        self.cache.insert(key, classification);
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.cache_order.clear();
    }

    pub fn cached_verdicts(&self) -> usize {
        self.cache.len()
    }
}

fn normalize_question(question: &str) -> String {
    question.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLanguageModel;

    fn router_with(model: Arc<MockLanguageModel>) -> Router {
        Router::new(KeywordScorer::default(), model)
    }

    #[tokio::test]
    async fn test_strong_data_question_skips_model() {
        let model = Arc::new(MockLanguageModel::replying("ADVICE"));
        let mut router = router_with(model.clone());

        for q in [
            "Berapa penjualan warung kopi bulan ini?",
            "Show me total revenue per business",
            "Produk apa yang paling laris?",
        ] {
            assert_eq!(router.classify(q).await, Classification::Data, "{}", q);
        }
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_advice_vocabulary_wins_over_weak_data_hit() {
        let model = Arc::new(MockLanguageModel::replying("DATA"));
        let mut router = router_with(model.clone());

        assert_eq!(
            router.classify("Tips untuk meningkatkan penjualan").await,
            Classification::Advice
        );
        assert_eq!(
            router.classify("How to improve customer service?").await,
            Classification::Advice
        );
        assert_eq!(
            router.classify("Bagaimana cara promosi di media sosial?").await,
            Classification::Advice
        );
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_single_data_hit_defaults_to_data() {
        let model = Arc::new(MockLanguageModel::replying("ADVICE"));
        let mut router = router_with(model.clone());

        assert_eq!(router.classify("bisnis").await, Classification::Data);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_no_signal_defers_to_model_once() {
        let model = Arc::new(MockLanguageModel::new().then_reply(" data \n"));
        let mut router = router_with(model.clone());

        assert_eq!(router.classify("Give me some ideas").await, Classification::Data);
        assert_eq!(model.call_count(), 1);
        assert!(model.calls()[0].as_text().contains("Question: Give me some ideas"));
    }

    #[tokio::test]
    async fn test_fallback_failures_default_to_advice() {
        let model = Arc::new(
            MockLanguageModel::new()
                .then_reply("I think it is DATA")
                .then_fail("timeout"),
        );
        let mut router = router_with(model.clone());

        assert_eq!(router.classify("halo").await, Classification::Advice);
        assert_eq!(router.classify("apa kabar?").await, Classification::Advice);
        assert_eq!(model.call_count(), 2);
        // Defaults are not cached
        assert_eq!(router.cached_verdicts(), 0);
    }

    #[tokio::test]
    async fn test_fallback_cache_and_clear() {
        let model = Arc::new(MockLanguageModel::replying("DATA"));
        let mut router = router_with(model.clone());

        assert_eq!(router.classify("Kapan toko ramai?").await, Classification::Data);
        assert_eq!(router.classify("  kapan toko ramai?").await, Classification::Data);
        assert_eq!(model.call_count(), 1);

        router.clear_cache();
        router.classify("Kapan toko ramai?").await;
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_fallback_cache_is_bounded() {
        let model = Arc::new(MockLanguageModel::replying("ADVICE"));
        let mut router = router_with(model.clone()).with_cache_limit(2);

        for q in ["halo", "Kapan toko ramai?", "Give me some ideas"] {
            router.classify(q).await;
        }
        assert_eq!(router.cached_verdicts(), 2);
        assert_eq!(model.call_count(), 3);

        // Oldest verdict was evicted, newest still cached
        router.classify("halo").await;
        assert_eq!(model.call_count(), 4);
        router.classify("Give me some ideas").await;
        assert_eq!(model.call_count(), 4);
        assert_eq!(router.cached_verdicts(), 2);
    }

    #[test]
    fn test_classify_from_blocking_caller() {
        let model = Arc::new(MockLanguageModel::failing());
        let mut router = router_with(model);

        let classification =
            tokio_test::block_on(router.classify("Berapa penjualan warung kopi bulan ini?"));
        assert_eq!(classification, Classification::Data);
    }

    #[test]
    fn test_verdict_defaults() {
        assert_eq!(FallbackVerdict::Failed.classification(), Classification::Advice);
        assert_eq!(FallbackVerdict::Unrecognized.classification(), Classification::Advice);
        assert_eq!(
            FallbackVerdict::Parsed(Classification::Data).classification(),
            Classification::Data
        );
    }
}
