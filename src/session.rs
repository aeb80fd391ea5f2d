//! Session construction and lookup
//!
//! Model clients, the query engine and the knowledge preamble are built once
//! and shared. Every session gets its own router, handlers and memories.

use crate::agent::{AdviceHandler, DataHandler, KnowledgePreamble, SessionOrchestrator};
use crate::classifier::{KeywordConfig, KeywordScorer};
use crate::config::{AssistantConfig, RoutingProfile};
use crate::error::AssistantError;
use crate::llm::{GeminiClient, LanguageModel};
use crate::locale::LanguageDetector;
use crate::memory::{ContextConfig, ConversationMemory};
use crate::query_engine::{DataQueryEngine, HttpQueryEngine};
use crate::router::Router;
use crate::verification::{CompletenessVerifier, EntityCatalog};
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

const ROUTER_TEMPERATURE: f32 = 0.0;
const ROUTER_MAX_TOKENS: i32 = 20;
const DATA_TEMPERATURE: f32 = 0.3;
const ADVICE_TEMPERATURE: f32 = 0.7;
const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(3600);

/// Builds fresh orchestrators over shared clients
pub struct SessionFactory {
    router_model: Arc<dyn LanguageModel>,
    data_model: Arc<dyn LanguageModel>,
    advice_model: Arc<dyn LanguageModel>,
    engine: Arc<dyn DataQueryEngine>,
    preamble: KnowledgePreamble,
    profile: RoutingProfile,
    memory: ContextConfig,
}

impl SessionFactory {
    pub fn new(
        router_model: Arc<dyn LanguageModel>,
        data_model: Arc<dyn LanguageModel>,
        advice_model: Arc<dyn LanguageModel>,
        engine: Arc<dyn DataQueryEngine>,
        preamble: KnowledgePreamble,
    ) -> Self {
        Self {
            router_model,
            data_model,
            advice_model,
            engine,
            preamble,
            profile: RoutingProfile::default(),
            memory: ContextConfig::default(),
        }
    }

    pub fn with_profile(mut self, profile: RoutingProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_memory_config(mut self, memory: ContextConfig) -> Self {
        self.memory = memory;
        self
    }

    /// Gemini for every model role, HTTP for the query engine
    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        let gemini = |temperature: f32| {
            GeminiClient::new(config.gemini_api_key.clone(), config.gemini_model.clone())
                .map(|c| c.with_temperature(temperature))
        };

        let router_model = gemini(ROUTER_TEMPERATURE)?.with_max_output_tokens(ROUTER_MAX_TOKENS);
        let data_model = gemini(DATA_TEMPERATURE)?;
        let advice_model = gemini(ADVICE_TEMPERATURE)?;
        let engine = HttpQueryEngine::new(config.data_query_url.clone(), config.data_query_timeout)?;

        let preamble = KnowledgePreamble::load(&config.knowledge_path)?;
        let profile = RoutingProfile::load(config.routing_profile_path.as_deref())?;

        info!(
            model = %config.gemini_model,
            query_engine = %config.data_query_url,
            "Session factory ready"
        );

        Ok(Self::new(
            Arc::new(router_model),
            Arc::new(data_model),
            Arc::new(advice_model),
            Arc::new(engine),
            preamble,
        )
        .with_profile(profile)
        .with_memory_config(config.memory.clone()))
    }

    pub fn build(&self) -> SessionOrchestrator {
        let language = LanguageDetector::new(&self.profile.language_markers);

        let router = Router::new(
            KeywordScorer::new(&self.profile.keywords),
            self.router_model.clone(),
        );

        let data = DataHandler::new(
            self.engine.clone(),
            self.data_model.clone(),
            ConversationMemory::new("data", self.memory.clone(), self.data_model.clone()),
            CompletenessVerifier::new(self.profile.entities.clone()),
            language.clone(),
        );

        let advice = AdviceHandler::new(
            self.advice_model.clone(),
            self.preamble.clone(),
            ConversationMemory::new("advice", self.memory.clone(), self.advice_model.clone()),
            language,
        );

        SessionOrchestrator::new(router, data, advice)
    }

    pub fn keywords(&self) -> &KeywordConfig {
        &self.profile.keywords
    }

    pub fn entities(&self) -> &EntityCatalog {
        &self.profile.entities
    }
}

pub type SharedSession = Arc<Mutex<SessionOrchestrator>>;

struct SessionEntry {
    session: SharedSession,
    last_used: DateTime<Utc>,
}

impl SessionEntry {
    fn is_idle(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        // A clock that went backwards never expires anything
        (now - self.last_used)
            .to_std()
            .map(|age| age >= ttl)
            .unwrap_or(false)
    }
}

/// Live sessions keyed by chat id.
///
/// Sessions unused for longer than the idle TTL are dropped whenever a
/// session is looked up or created.
pub struct SessionRegistry {
    factory: SessionFactory,
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
    idle_ttl: Duration,
}

impl SessionRegistry {
    pub fn new(factory: SessionFactory) -> Self {
        Self {
            factory,
            sessions: RwLock::new(HashMap::new()),
            idle_ttl: DEFAULT_IDLE_TTL,
        }
    }

    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    pub async fn get_or_create(&self, chat_id: Uuid) -> SharedSession {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        Self::evict_idle(&mut sessions, now, self.idle_ttl);

        let entry = sessions.entry(chat_id).or_insert_with(|| {
            info!(chat_id = %chat_id, "Created session");
            SessionEntry {
                session: Arc::new(Mutex::new(self.factory.build())),
                last_used: now,
            }
        });
        entry.last_used = now;
        entry.session.clone()
    }

    /// Look up an existing session and mark it used
    pub async fn get(&self, chat_id: Uuid) -> Option<SharedSession> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        Self::evict_idle(&mut sessions, now, self.idle_ttl);

        sessions.get_mut(&chat_id).map(|entry| {
            entry.last_used = now;
            entry.session.clone()
        })
    }

    /// Clear one session's memories and routing cache
    pub async fn reset(&self, chat_id: Uuid) -> Result<()> {
        let session = self
            .get(chat_id)
            .await
            .ok_or_else(|| AssistantError::Session(format!("Unknown chat: {}", chat_id)))?;
        session.lock().await.reset();
        Ok(())
    }

    pub async fn remove(&self, chat_id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&chat_id).is_some();
        if removed {
            info!(chat_id = %chat_id, "Removed session");
        }
        removed
    }

    /// Drop every session idle at `now`. Returns how many were dropped.
    pub async fn prune_idle(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        Self::evict_idle(&mut sessions, now, self.idle_ttl)
    }

    fn evict_idle(
        sessions: &mut HashMap<Uuid, SessionEntry>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> usize {
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_idle(now, ttl));
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLanguageModel;
    use crate::query_engine::MockQueryEngine;

    fn factory(engine: MockQueryEngine) -> SessionFactory {
        SessionFactory::new(
            Arc::new(MockLanguageModel::replying("ADVICE")),
            Arc::new(MockLanguageModel::failing()),
            Arc::new(MockLanguageModel::replying("Fokus pada pelanggan tetap.")),
            Arc::new(engine),
            KnowledgePreamble::from_text("Konteks").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let registry = SessionRegistry::new(factory(MockQueryEngine::new().then_reply("Rp 10")));
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        registry
            .get_or_create(a)
            .await
            .lock()
            .await
            .dispatch("Total omzet warung?")
            .await;

        let snapshot_a = registry.get_or_create(a).await.lock().await.snapshot();
        let snapshot_b = registry.get_or_create(b).await.lock().await.snapshot();
        assert_eq!(snapshot_a.data.exchange_count, 1);
        assert_eq!(snapshot_b.data.exchange_count, 0);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_same_id_returns_same_session() {
        let registry = SessionRegistry::new(factory(MockQueryEngine::new()));
        let id = Uuid::new_v4();

        let first = registry.get_or_create(id).await;
        let second = registry.get_or_create(id).await;
        assert!(Arc::ptr_eq(&first, &second));

        assert!(registry.reset(id).await.is_ok());
        assert!(registry.remove(id).await);
        assert!(!registry.remove(id).await);
        assert!(registry.get(id).await.is_none());
        assert!(registry.is_empty().await);
        assert!(matches!(
            registry.reset(id).await,
            Err(AssistantError::Session(_))
        ));
    }

    #[tokio::test]
    async fn test_idle_sessions_are_evicted() {
        let registry = SessionRegistry::new(factory(MockQueryEngine::new()))
            .with_idle_ttl(Duration::from_secs(3600));
        let stale = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        registry.get_or_create(stale).await;
        registry.get_or_create(fresh).await;

        assert_eq!(registry.prune_idle(Utc::now()).await, 0);
        assert_eq!(registry.len().await, 2);

        let later = Utc::now() + chrono::Duration::seconds(7200);
        assert_eq!(registry.prune_idle(later).await, 2);
        assert!(registry.is_empty().await);
        assert!(registry.get(stale).await.is_none());
    }

    #[tokio::test]
    async fn test_lookup_drops_other_idle_sessions() {
        let registry = SessionRegistry::new(factory(MockQueryEngine::new()))
            .with_idle_ttl(Duration::ZERO);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        registry.get_or_create(first).await;
        registry.get_or_create(second).await;

        // Only the session being served survives a zero TTL
        assert_eq!(registry.len().await, 1);
        assert!(registry.get(first).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_use_refreshes_idle_clock() {
        let registry = SessionRegistry::new(factory(MockQueryEngine::new()))
            .with_idle_ttl(Duration::from_secs(60));
        let id = Uuid::new_v4();
        registry.get_or_create(id).await;

        assert_eq!(registry.prune_idle(Utc::now() + chrono::Duration::seconds(30)).await, 0);
        registry.get(id).await;
        assert_eq!(registry.prune_idle(Utc::now() + chrono::Duration::seconds(59)).await, 0);
        assert_eq!(registry.prune_idle(Utc::now() + chrono::Duration::seconds(120)).await, 1);
    }

    #[tokio::test]
    async fn test_profile_flows_into_sessions() {
        let profile = RoutingProfile::from_json(
            r#"{"keywords":{"data_keywords":["omset"],"data_strong_keywords":["omset"]}}"#,
        )
        .unwrap();
        let engine = MockQueryEngine::new().then_reply("Rp 5");
        let factory = factory(engine).with_profile(profile);
        assert_eq!(factory.keywords().data_keywords, vec!["omset".to_string()]);
        assert_eq!(factory.entities().entities.len(), 3);

        let mut session = factory.build();
        let dispatch = session.dispatch_detailed("omset kemarin").await.unwrap();
        assert_eq!(dispatch.classification, crate::models::Classification::Data);
        assert_eq!(dispatch.answer, "Rp 5");
    }

    #[test]
    fn test_from_config_requires_preamble_file() {
        let config = AssistantConfig::from_lookup(|key| match key {
            "GEMINI_API_KEY" => Some("key".to_string()),
            "DATA_QUERY_URL" => Some("http://localhost:9000/query".to_string()),
            "KNOWLEDGE_PREAMBLE_PATH" => Some("/nonexistent/base_context.txt".to_string()),
            _ => None,
        })
        .unwrap();

        assert!(matches!(
            SessionFactory::from_config(&config),
            Err(AssistantError::Config(_))
        ));
    }
}
