//! Runtime configuration
//!
//! Everything comes from the environment (optionally via `.env`, loaded by
//! the binaries). Keyword lists, business units and language markers live in
//! an optional JSON routing profile so they can change without a rebuild.

use crate::classifier::KeywordConfig;
use crate::error::AssistantError;
use crate::llm::gemini::DEFAULT_MODEL;
use crate::locale::LanguageDetector;
use crate::memory::ContextConfig;
use crate::verification::EntityCatalog;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

const DEFAULT_KNOWLEDGE_PATH: &str = "prompts/base_context.txt";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SESSION_IDLE_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub data_query_url: String,
    pub data_query_timeout: Duration,
    pub knowledge_path: PathBuf,
    pub routing_profile_path: Option<PathBuf>,
    pub memory: ContextConfig,
    /// Sessions unused for this long are dropped
    pub session_idle_ttl: Duration,
    pub port: u16,
}

impl AssistantConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let gemini_api_key = get("GEMINI_API_KEY")
            .ok_or_else(|| AssistantError::Config("GEMINI_API_KEY is not set".to_string()))?;
        let data_query_url = get("DATA_QUERY_URL")
            .ok_or_else(|| AssistantError::Config("DATA_QUERY_URL is not set".to_string()))?;

        let defaults = ContextConfig::default();
        let memory = ContextConfig {
            max_context_tokens: parse_or(get("MEMORY_MAX_TOKENS"), "MEMORY_MAX_TOKENS", defaults.max_context_tokens)?,
            preserve_recent_turns: parse_or(
                get("MEMORY_PRESERVE_TURNS"),
                "MEMORY_PRESERVE_TURNS",
                defaults.preserve_recent_turns,
            )?,
            ..defaults
        };

        let port = match get("PORT") {
            Some(port) => parse_or(Some(port), "PORT", DEFAULT_PORT)?,
            None => parse_or(get("API_PORT"), "API_PORT", DEFAULT_PORT)?,
        };

        Ok(Self {
            gemini_api_key,
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            data_query_url,
            data_query_timeout: Duration::from_secs(parse_or(
                get("DATA_QUERY_TIMEOUT_SECS"),
                "DATA_QUERY_TIMEOUT_SECS",
                DEFAULT_QUERY_TIMEOUT_SECS,
            )?),
            knowledge_path: get("KNOWLEDGE_PREAMBLE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_KNOWLEDGE_PATH)),
            routing_profile_path: get("ROUTING_PROFILE_PATH").map(PathBuf::from),
            memory,
            session_idle_ttl: Duration::from_secs(parse_or(
                get("SESSION_IDLE_TTL_SECS"),
                "SESSION_IDLE_TTL_SECS",
                DEFAULT_SESSION_IDLE_TTL_SECS,
            )?),
            port,
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| AssistantError::Config(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(default),
    }
}

/// Routing and verification vocabulary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingProfile {
    pub keywords: KeywordConfig,
    pub entities: EntityCatalog,
    pub language_markers: Vec<String>,
}

impl Default for RoutingProfile {
    fn default() -> Self {
        Self {
            keywords: KeywordConfig::default(),
            entities: EntityCatalog::default(),
            language_markers: LanguageDetector::default_markers(),
        }
    }
}

impl RoutingProfile {
    /// Built-in profile when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path).map_err(|e| {
            AssistantError::Config(format!("Cannot read routing profile {}: {}", path.display(), e))
        })?;
        let profile = Self::from_json(&raw)?;

        info!(
            path = %path.display(),
            entities = profile.entities.entities.len(),
            "Loaded routing profile"
        );
        Ok(profile)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
