//! End-to-end pipeline: ingest, filter, then metrics and aggregations.
//!
//! The outcome is a tagged value rather than an error so the caller can tell
//! a halted filter, an empty selection and a schema problem apart.

use chrono::Utc;
use floor_core::models::{
    Aggregations, Dataset, FilterCriteria, FilterHalted, FilteredView, MetricResult, RawTable,
    RootCauseSource,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregator::Aggregator;
use crate::filter::FilterEngine;
use crate::ingest::{IngestOptions, Ingester};
use crate::metrics::MetricsCalculator;

/// Number of root causes ranked when not configured.
pub const DEFAULT_TOP_N: usize = 10;

// ── Public types ──────────────────────────────────────────────────────────────

/// Options for [`run_pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub ingest: IngestOptions,
    pub top_n: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            ingest: IngestOptions::default(),
            top_n: DEFAULT_TOP_N,
        }
    }
}

/// Metadata produced alongside a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// ISO-8601 timestamp when this report was generated.
    pub generated_at: String,
    /// Records in the dataset before filtering.
    pub records_ingested: usize,
    /// Records that passed the filter.
    pub records_selected: usize,
    /// Column the root-cause keys were read from.
    pub root_cause_source: RootCauseSource,
}

/// Everything computed for a non-empty selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub view: FilteredView,
    pub metrics: MetricResult,
    pub aggregations: Aggregations,
    pub metadata: ReportMetadata,
}

/// Tagged result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// Metrics and aggregations over a non-empty selection.
    Ready(Box<Report>),
    /// The criteria had exactly one date endpoint.
    Halted(FilterHalted),
    /// The criteria were valid but selected no records.
    Empty { records_ingested: usize },
    /// The raw table could not be interpreted.
    SchemaError { message: String },
}

impl PipelineOutcome {
    pub fn report(&self) -> Option<&Report> {
        match self {
            PipelineOutcome::Ready(report) => Some(report.as_ref()),
            _ => None,
        }
    }
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Run the full pipeline over raw rows.
///
/// 1. Ingest `table` (schema errors stop here).
/// 2. Filter with `criteria` (a half-open date range halts here).
/// 3. Report an empty selection without computing anything.
/// 4. Compute metrics and aggregations.
pub fn run_pipeline(
    table: &RawTable,
    criteria: &FilterCriteria,
    options: &PipelineOptions,
) -> PipelineOutcome {
    match Ingester::new(options.ingest.clone()).ingest(table) {
        Ok(dataset) => analyze_dataset(&dataset, criteria, options.top_n),
        Err(e) => {
            info!("Pipeline stopped on schema error: {}", e);
            PipelineOutcome::SchemaError {
                message: e.to_string(),
            }
        }
    }
}

/// Steps 2–4 of [`run_pipeline`] over an already-ingested dataset.
pub fn analyze_dataset(dataset: &Dataset, criteria: &FilterCriteria, top_n: usize) -> PipelineOutcome {
    let view = match FilterEngine::apply(dataset, criteria) {
        Ok(view) => view,
        Err(halted) => return PipelineOutcome::Halted(halted),
    };

    if view.is_empty() {
        debug!("No records selected out of {}", dataset.len());
        return PipelineOutcome::Empty {
            records_ingested: dataset.len(),
        };
    }

    let metrics = MetricsCalculator::compute(&view);
    let aggregations = Aggregator::aggregate(&view, top_n);
    let metadata = ReportMetadata {
        generated_at: Utc::now().to_rfc3339(),
        records_ingested: dataset.len(),
        records_selected: view.len(),
        root_cause_source: dataset.root_cause_source.clone(),
    };

    PipelineOutcome::Ready(Box::new(Report {
        view,
        metrics,
        aggregations,
        metadata,
    }))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
