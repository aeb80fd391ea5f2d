//! Answer completeness verification
//!
//! Rules-based check applied to data answers for questions that ask about
//! every business unit. Deterministic; no model calls. The entity names,
//! trigger phrases and placeholder labels are configuration data.

use serde::{Deserialize, Serialize};
use tracing::info;

/// One business unit the records cover
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusinessEntity {
    /// Proper name as it should appear in answers
    pub name: String,
    /// Shorter spellings that also count as naming the unit
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl BusinessEntity {
    fn new(name: &str, aliases: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn is_named_in(&self, lowered: &str) -> bool {
        std::iter::once(&self.name)
            .chain(self.aliases.iter())
            .any(|n| lowered.contains(&n.to_lowercase()))
    }
}

/// Known business units and the phrases around them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityCatalog {
    pub entities: Vec<BusinessEntity>,
    /// Question phrases meaning "every business unit"
    pub all_entities_phrases: Vec<String>,
    /// Generic labels that stand in for proper names
    pub placeholder_labels: Vec<String>,
}

impl Default for EntityCatalog {
    fn default() -> Self {
        Self {
            entities: vec![
                BusinessEntity::new("Warung Kopi Gembira", &["kopi gembira"]),
                BusinessEntity::new("Warung Sayur Buah Sehat", &["sayur buah sehat"]),
                BusinessEntity::new("Warung Sembako Berkah", &["sembako berkah"]),
            ],
            all_entities_phrases: [
                "semua warung", "setiap warung", "ketiga warung", "3 warung",
                "masing-masing warung", "breakdown", "all businesses", "each business",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            placeholder_labels: [
                "bisnis 1", "bisnis 2", "bisnis 3",
                "business 1", "business 2", "business 3",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl EntityCatalog {
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.name.as_str()).collect()
    }
}

/// Trait for answer rules
pub trait AnswerRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// `lowered` is the answer in lower case
    fn verify(&self, lowered: &str) -> RuleCheck;
}

pub struct RuleCheck {
    pub passed: bool,
    pub details: String,
}

/// Rule: every known unit is named
pub struct EntityCoverageRule {
    entities: Vec<BusinessEntity>,
}

impl AnswerRule for EntityCoverageRule {
    fn name(&self) -> &'static str {
        "entity_coverage"
    }

    fn verify(&self, lowered: &str) -> RuleCheck {
        let missing: Vec<&str> = self
            .entities
            .iter()
            .filter(|e| !e.is_named_in(lowered))
            .map(|e| e.name.as_str())
            .collect();

        RuleCheck {
            passed: missing.is_empty(),
            details: if missing.is_empty() {
                format!("All {} business units named", self.entities.len())
            } else {
                format!("Missing: {}", missing.join(", "))
            },
        }
    }
}

/// Rule: no numbered stand-ins for proper names
pub struct PlaceholderLabelRule {
    labels: Vec<String>,
}

impl AnswerRule for PlaceholderLabelRule {
    fn name(&self) -> &'static str {
        "no_placeholder_labels"
    }

    fn verify(&self, lowered: &str) -> RuleCheck {
        let found: Vec<&str> = self
            .labels
            .iter()
            .map(|l| l.as_str())
            .filter(|l| lowered.contains(l))
            .collect();

        RuleCheck {
            passed: found.is_empty(),
            details: if found.is_empty() {
                "No placeholder labels".to_string()
            } else {
                format!("Placeholder labels used: {}", found.join(", "))
            },
        }
    }
}

/// Outcome of a completeness check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletenessReport {
    /// The question asks about every business unit
    pub applicable: bool,
    pub complete: bool,
    pub issues: Vec<String>,
}

/// Runs the answer rules for "all business units" questions
pub struct CompletenessVerifier {
    catalog: EntityCatalog,
    rules: Vec<Box<dyn AnswerRule>>,
}

impl CompletenessVerifier {
    pub fn new(catalog: EntityCatalog) -> Self {
        let rules: Vec<Box<dyn AnswerRule>> = vec![
            Box::new(EntityCoverageRule {
                entities: catalog.entities.clone(),
            }),
            Box::new(PlaceholderLabelRule {
                labels: catalog
                    .placeholder_labels
                    .iter()
                    .map(|l| l.to_lowercase())
                    .collect(),
            }),
        ];

        Self { catalog, rules }
    }

    pub fn catalog(&self) -> &EntityCatalog {
        &self.catalog
    }

    pub fn asks_for_all(&self, question: &str) -> bool {
        let lowered = question.to_lowercase();
        self.catalog
            .all_entities_phrases
            .iter()
            .any(|p| lowered.contains(&p.to_lowercase()))
    }

    pub fn verify(&self, question: &str, answer: &str) -> CompletenessReport {
        if !self.asks_for_all(question) {
            return CompletenessReport {
                applicable: false,
                complete: true,
                issues: Vec::new(),
            };
        }

        let lowered = answer.to_lowercase();
        let issues: Vec<String> = self
            .rules
            .iter()
            .filter_map(|rule| {
                let check = rule.verify(&lowered);
                (!check.passed).then(|| format!("{}: {}", rule.name(), check.details))
            })
            .collect();

        let complete = issues.is_empty();

        info!(rule_count = self.rules.len(), complete, "Completeness check completed");

        CompletenessReport {
            applicable: true,
            complete,
            issues,
        }
    }
}

impl Default for CompletenessVerifier {
    fn default() -> Self {
        Self::new(EntityCatalog::default())
    }
}

//
// ================= Tests =================
//
