//! UMKM Assistant
//!
//! A conversational assistant for small-business (UMKM) owners that:
//! - Routes each question to a data handler or an advice handler
//! - Answers data questions through an external query engine
//! - Checks multi-business answers for completeness and retries once
//! - Answers advice questions from a fixed knowledge preamble
//! - Keeps a separate, self-compacting memory per handler
//!
//! FLOW:
//! INPUT → CLASSIFY → DATA (ENRICH → QUERY → VERIFY → RETRY? → INSIGHTS)
//!                  → ADVICE (PREAMBLE + HISTORY → MODEL) → REMEMBER

pub mod agent;
pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod llm;
pub mod locale;
pub mod memory;
pub mod models;
pub mod query_engine;
pub mod router;
pub mod session;
pub mod verification;

pub use error::{AssistantError, Result};

// Re-export common types
pub use agent::{SessionOrchestrator, SessionSnapshot};
pub use models::*;
