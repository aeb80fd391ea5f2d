//! Conversation Memory
//!
//! Turn history, token-budget management and summary compaction. The data
//! and advice handlers each own one [`ConversationMemory`].

pub mod context_manager;
pub mod conversation;
pub mod store;
pub mod summarizer;

pub use context_manager::{ContextConfig, ContextManager};
pub use conversation::{ConversationMemory, MemorySnapshot, EMPTY_SUMMARY_PLACEHOLDER};
pub use store::{ConversationHistory, Speaker, Turn};
pub use summarizer::ContextSummarizer;
