//! Shared domain types for the production-floor metrics pipeline.
//!
//! Holds the typed event records, filter criteria and result shapes, the
//! locale-aware value normalizers, category classification, error types and
//! CLI settings used by every other crate in the workspace.

pub mod classification;
pub mod data_processors;
pub mod error;
pub mod models;
pub mod settings;

pub use error::{FloorError, Result};
