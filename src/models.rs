//! Core data models shared by the router, memories and handlers

use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Routing =================
//

/// Which handler a question is sent to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Needs figures from the transactional records
    Data,
    /// Needs advisory or strategic guidance
    Advice,
}

impl Classification {
    /// Parse a fallback-model verdict. Only the two exact labels are accepted.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_uppercase().as_str() {
            "DATA" => Some(Classification::Data),
            "ADVICE" => Some(Classification::Advice),
            _ => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Data => write!(f, "DATA"),
            Classification::Advice => write!(f, "ADVICE"),
        }
    }
}

//
// ================= LLM Input =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// What a language model is asked to complete: either one bare prompt or an
/// ordered list of role-tagged messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmInput {
    Prompt(String),
    Messages(Vec<ChatMessage>),
}

impl LlmInput {
    /// Flatten into plain text, mainly for logging and mocks.
    pub fn as_text(&self) -> String {
        match self {
            LlmInput::Prompt(prompt) => prompt.clone(),
            LlmInput::Messages(messages) => messages
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<String> for LlmInput {
    fn from(prompt: String) -> Self {
        LlmInput::Prompt(prompt)
    }
}

impl From<&str> for LlmInput {
    fn from(prompt: &str) -> Self {
        LlmInput::Prompt(prompt.to_string())
    }
}

//
// ================= Dispatch =================
//

/// Outcome of one orchestrated turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispatch {
    pub classification: Classification,
    pub answer: String,
}
