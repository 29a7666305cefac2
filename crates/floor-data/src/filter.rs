//! Date-range and membership filtering.

use chrono::NaiveDate;
use floor_core::models::{
    Dataset, EventRecord, FilterCriteria, FilterHalted, FilteredView, MissingEndpoint,
};
use tracing::debug;

// ── DateRange ─────────────────────────────────────────────────────────────────

/// Validated form of the caller's date endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateRange {
    /// No endpoints supplied: dates are not checked.
    Unbounded,
    /// Inclusive on both ends.
    Between(NaiveDate, NaiveDate),
}

impl DateRange {
    fn from_criteria(criteria: &FilterCriteria) -> Result<Self, FilterHalted> {
        match (criteria.start, criteria.end) {
            (Some(start), Some(end)) => Ok(DateRange::Between(start, end)),
            (None, None) => Ok(DateRange::Unbounded),
            (Some(_), None) => Err(FilterHalted {
                missing: MissingEndpoint::End,
            }),
            (None, Some(_)) => Err(FilterHalted {
                missing: MissingEndpoint::Start,
            }),
        }
    }

    fn contains(&self, date: Option<NaiveDate>) -> bool {
        match self {
            DateRange::Unbounded => true,
            DateRange::Between(start, end) => date.is_some_and(|d| *start <= d && d <= *end),
        }
    }
}

// ── FilterEngine ──────────────────────────────────────────────────────────────

/// Stateless filter over datasets and views.
pub struct FilterEngine;

impl FilterEngine {
    /// Filter a freshly ingested dataset.
    pub fn apply(dataset: &Dataset, criteria: &FilterCriteria) -> Result<FilteredView, FilterHalted> {
        Self::apply_records(&dataset.records, &dataset.category_labels, criteria)
    }

    /// Re-filter an existing view. Applying the same criteria again returns
    /// an identical view.
    pub fn refine(view: &FilteredView, criteria: &FilterCriteria) -> Result<FilteredView, FilterHalted> {
        Self::apply_records(&view.records, &view.category_labels, criteria)
    }

    fn apply_records(
        records: &[EventRecord],
        category_labels: &[String],
        criteria: &FilterCriteria,
    ) -> Result<FilteredView, FilterHalted> {
        let range = DateRange::from_criteria(criteria).map_err(|halted| {
            debug!("Filter halted: {}", halted);
            halted
        })?;

        let kept: Vec<EventRecord> = records
            .iter()
            .filter(|r| {
                range.contains(r.date)
                    && criteria.factories.contains(&r.factory)
                    && criteria.machines.contains(&r.machine)
            })
            .cloned()
            .collect();

        debug!("Filter kept {} of {} records", kept.len(), records.len());

        Ok(FilteredView {
            records: kept,
            category_labels: category_labels.to_vec(),
        })
    }
}

/// Apply `criteria` to `dataset`.
pub fn filter(dataset: &Dataset, criteria: &FilterCriteria) -> Result<FilteredView, FilterHalted> {
    FilterEngine::apply(dataset, criteria)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
