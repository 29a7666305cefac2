//! Runtime collaborators around the metrics pipeline.
//!
//! Owns fetching of the raw feed, a TTL cache of the ingested dataset with an
//! injectable clock, and the refresh loop that recomputes the pipeline on a
//! fixed interval.

pub mod clock;
pub mod data_manager;
pub mod orchestrator;

pub use floor_core as core;
pub use floor_data as data;
