//! Substring-based event classification.
//!
//! All matching is case-insensitive. Production and failure checks look at a
//! single column; category checks scan every field of the row, so a pattern
//! found in an operator name or a free-text column counts as a match.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

use crate::models::EventRecord;

/// Substring of `Evento` marking production time.
pub const PRODUCTION_PATTERN: &str = "Producción";
/// Substring of `Nivel Evento 3` marking a failure.
pub const FAILURE_PATTERN: &str = "FALLA";
/// Regex over `Evento` selecting stoppage-or-failure events for the pivot.
pub const STOPPAGE_PATTERN: &str = "Parada|Falla";

/// Category labels reported by default.
pub const DEFAULT_CATEGORIES: [&str; 3] = ["SMED", "BAÑO", "REFRIGERIO"];

/// Case-insensitive substring test.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// `true` when any field of `record` contains `pattern`.
pub fn row_matches(record: &EventRecord, pattern: &str) -> bool {
    let needle = pattern.to_lowercase();
    record
        .field_texts()
        .iter()
        .any(|text| text.to_lowercase().contains(&needle))
}

pub fn is_production(record: &EventRecord) -> bool {
    contains_ci(&record.event, PRODUCTION_PATTERN)
}

/// Level-3 failure check. A missing level never matches.
pub fn is_failure(record: &EventRecord) -> bool {
    record
        .level3
        .as_deref()
        .is_some_and(|level| contains_ci(level, FAILURE_PATTERN))
}

/// Event-based stoppage-or-failure check used by the machine pivot.
pub fn is_stoppage_or_failure(record: &EventRecord) -> bool {
    stoppage_regex().is_match(&record.event)
}

fn stoppage_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(STOPPAGE_PATTERN)
            .case_insensitive(true)
            .build()
            .expect("regex is valid")
    })
}

// ── Classifier ────────────────────────────────────────────────────────────────

/// Tags records with the category labels that occur anywhere in the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    labels: Vec<String>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_CATEGORIES)
    }
}

impl Classifier {
    /// Duplicate and blank labels are dropped; order is kept.
    pub fn new<I>(labels: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut seen = BTreeSet::new();
        let labels = labels
            .into_iter()
            .map(Into::into)
            .filter(|l: &String| !l.trim().is_empty() && seen.insert(l.clone()))
            .collect();
        Self { labels }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn tag(&self, record: &EventRecord) -> BTreeSet<String> {
        self.labels
            .iter()
            .filter(|label| row_matches(record, label))
            .cloned()
            .collect()
    }
}
