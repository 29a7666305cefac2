//! Ingestion, filtering and aggregation for production-floor event logs.
//!
//! Reads the raw sheet export, normalises it into a typed [`Dataset`],
//! applies filter criteria and computes the metrics and breakdowns consumed
//! by the presentation layer. Every stage is a pure function of its input.
//!
//! [`Dataset`]: floor_core::models::Dataset

pub mod aggregator;
pub mod analysis;
pub mod filter;
pub mod ingest;
pub mod metrics;
pub mod reader;

pub use floor_core as core;

pub use aggregator::aggregate;
pub use analysis::{run_pipeline, PipelineOptions, PipelineOutcome, Report};
pub use filter::filter;
pub use ingest::ingest;
pub use metrics::metrics;
