//! Data Handler
//!
//! Answers questions that need figures from the business records. Query
//! construction and execution belong to the external [`DataQueryEngine`];
//! this handler enriches the question with memory, checks the draft for
//! missing business units, retries once, and appends business insights.

use crate::locale::{apology, Language, LanguageDetector};
use crate::llm::LanguageModel;
use crate::memory::ConversationMemory;
use crate::models::LlmInput;
use crate::query_engine::DataQueryEngine;
use crate::verification::CompletenessVerifier;
use crate::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Answers shorter than this are not worth an insight call
const INSIGHT_MIN_CHARS: usize = 50;

/// An answer containing any of these already has insights
const INSIGHT_MARKERS: &[&str] = &[
    "From what I can see",
    "My recommendations",
    "Rekomendasi:",
    "Rekomendasi saya",
    "Dari data yang saya lihat",
];

pub struct DataHandler {
    engine: Arc<dyn DataQueryEngine>,
    model: Arc<dyn LanguageModel>,
    memory: ConversationMemory,
    verifier: CompletenessVerifier,
    language: LanguageDetector,
}

impl DataHandler {
    pub fn new(
        engine: Arc<dyn DataQueryEngine>,
        model: Arc<dyn LanguageModel>,
        memory: ConversationMemory,
        verifier: CompletenessVerifier,
        language: LanguageDetector,
    ) -> Self {
        Self {
            engine,
            model,
            memory,
            verifier,
            language,
        }
    }

    /// Answer one question. Failures become an apology and leave memory as it was.
    pub async fn handle(&mut self, question: &str) -> String {
        let language = self.language.detect(question);
        let turn = self.memory.exchange_count() + 1;

        info!(turn, "Processing data query: {}", preview(question));

        match self.answer(question, language).await {
            Ok(answer) => {
                self.memory.append(question, &answer).await;
                info!(turn, "Data query completed");
                answer
            }
            Err(e) => {
                error!(turn, "Data query failed: {}", e);
                apology(language, &e.to_string())
            }
        }
    }

    async fn answer(&self, question: &str, language: Language) -> Result<String> {
        let enriched = self.memory.build_prompt_context(question);
        let mut answer = self.engine.invoke(&enriched).await?;

        let report = self.verifier.verify(question, &answer);
        if !report.complete {
            warn!(issues = ?report.issues, "Incomplete multi-business answer, retrying once");

            let retry_input = format!("{}\n\n{}", enriched, self.corrective_instruction());
            answer = self.engine.invoke(&retry_input).await?;

            let recheck = self.verifier.verify(question, &answer);
            if !recheck.complete {
                warn!(issues = ?recheck.issues, "Retry still incomplete, returning it as is");
            }
        }

        Ok(self.add_insights(language, answer).await)
    }

    fn corrective_instruction(&self) -> String {
        let catalog = self.verifier.catalog();
        let names = catalog
            .entity_names()
            .iter()
            .map(|n| format!("'{}'", n))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = catalog
            .placeholder_labels
            .iter()
            .map(|l| format!("'{}'", l))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "IMPORTANT: Use the actual business names from the database: {}. \
             NEVER use generic labels such as {}. \
             Always look up each business's name from the business table. \
             ALWAYS show complete numbers with proper formatting (e.g., 283,469,657.00) \
             and transaction counts for every business.",
            names, placeholders
        )
    }

    /// Append insights after the data; the data itself is never rewritten.
    async fn add_insights(&self, language: Language, answer: String) -> String {
        if answer.chars().count() < INSIGHT_MIN_CHARS || has_insights(&answer) {
            return answer;
        }

        match self.model.invoke(LlmInput::Prompt(insight_prompt(language, &answer))).await {
            Ok(insights) if !insights.trim().is_empty() => {
                format!("{}\n\n{}", answer, insights.trim())
            }
            Ok(_) => answer,
            Err(e) => {
                warn!("Insight generation failed, returning data only: {}", e);
                answer
            }
        }
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn clear_memory(&mut self) {
        self.memory.clear();
    }
}

fn has_insights(answer: &str) -> bool {
    INSIGHT_MARKERS.iter().any(|m| answer.contains(m))
}

fn insight_prompt(language: Language, answer: &str) -> String {
    match language {
        Language::Indonesian => format!(
            r#"Anda adalah penasihat bisnis untuk pemilik warung. Berdasarkan analisis data berikut, berikan wawasan tambahan.

Analisis Data:
{}

Tulis wawasan dan rekomendasi dalam bahasa Indonesia. Teks ini akan DITAMBAHKAN setelah data di atas, jadi jangan ulangi angkanya:

Dari data yang saya lihat, [pola atau tren]. Hal ini menunjukkan [wawasan praktis tentang bisnis].

Rekomendasi saya:
- [Saran konkret pertama]
- [Saran praktis kedua]
- [Saran ketiga jika relevan]"#,
            answer
        ),
        Language::English => format!(
            r#"You are a business advisor for small shop owners. Based on the data analysis below, provide additional insights.

Data Analysis:
{}

Write insights and recommendations in English. This text will be APPENDED after the data above, so do not repeat the figures:

From what I can see in the data, [pattern or trend]. This suggests [practical insight about the business].

My recommendations would be:
- [First concrete suggestion]
- [Second practical suggestion]
- [Third suggestion if relevant]"#,
            answer
        ),
    }
}

fn preview(text: &str) -> String {
    crate::memory::context_manager::truncate_chars(text, 50)
}
