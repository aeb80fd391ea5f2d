//! Error types for the UMKM assistant

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {

    // =============================
    // Startup
    // =============================

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // Collaborator Failures
    // =============================

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Query engine error: {0}")]
    QueryEngine(String),

    #[error("Summarization error: {0}")]
    Summarization(String),

    #[error("Session error: {0}")]
    Session(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
