//! Bilingual helpers
//!
//! Questions arrive in Indonesian or English. A small marker-word heuristic
//! picks the language for generated insights and user-facing apologies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Indonesian,
    English,
}

const INDONESIAN_MARKERS: &[&str] = &[
    "bagaimana", "apa", "berapa", "dimana", "kapan", "mengapa", "kenapa",
    "penjualan", "bisnis", "warung", "pelanggan", "pembayaran", "produk",
    "tolong", "saran", "untuk", "bulan",
];

/// Marker-word language detector
#[derive(Debug, Clone)]
pub struct LanguageDetector {
    markers: Vec<String>,
}

impl LanguageDetector {
    pub fn new(markers: &[String]) -> Self {
        Self {
            markers: markers.iter().map(|m| m.trim().to_lowercase()).filter(|m| !m.is_empty()).collect(),
        }
    }

    pub fn default_markers() -> Vec<String> {
        INDONESIAN_MARKERS.iter().map(|m| m.to_string()).collect()
    }

    /// Indonesian when any marker appears as a whole word, English otherwise
    pub fn detect(&self, text: &str) -> Language {
        let words = padded_words(text);
        if self
            .markers
            .iter()
            .any(|m| words.contains(padded_words(m).as_str()))
        {
            Language::Indonesian
        } else {
            Language::English
        }
    }
}

/// Lowercased words joined by single spaces, with a space on each end
fn padded_words(text: &str) -> String {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    format!(" {} ", words.join(" "))
}

impl Default for LanguageDetector {
    fn default() -> Self {
        Self::new(&Self::default_markers())
    }
}

/// Turn-level failure message shown instead of an answer
pub fn apology(language: Language, detail: &str) -> String {
    match language {
        Language::Indonesian => format!(
            "Maaf, terjadi kesalahan saat memproses pertanyaan Anda: {}",
            detail
        ),
        Language::English => format!(
            "Sorry, something went wrong while processing your question: {}",
            detail
        ),
    }
}
