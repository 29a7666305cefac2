use chrono::NaiveDate;
use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::classification::{Classifier, DEFAULT_CATEGORIES};
use crate::data_processors::DateParser;
use crate::error::FloorError;
use crate::models::{Dataset, FilterCriteria};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Production-floor event metrics
#[derive(Parser, Debug, Clone)]
#[command(
    name = "floor-metrics",
    about = "Metrics and breakdowns over a production-floor event log",
    version
)]
pub struct Settings {
    /// JSON export of the event sheet
    #[arg(long, env = "FLOOR_METRICS_DATA")]
    pub data_file: Option<PathBuf>,

    /// First day of the range, inclusive (dd/mm/yyyy or yyyy-mm-dd)
    #[arg(long, value_parser = parse_cli_date)]
    pub start: Option<NaiveDate>,

    /// Last day of the range, inclusive (dd/mm/yyyy or yyyy-mm-dd)
    #[arg(long, value_parser = parse_cli_date)]
    pub end: Option<NaiveDate>,

    /// Factory to include (repeatable; all factories when omitted)
    #[arg(long = "factory")]
    pub factories: Vec<String>,

    /// Machine to include (repeatable; all machines when omitted)
    #[arg(long = "machine")]
    pub machines: Vec<String>,

    /// Number of root causes in the ranking
    #[arg(long, default_value = "10")]
    pub top_n: usize,

    /// Column holding the root cause (defaults to "Nivel Evento 6")
    #[arg(long)]
    pub root_cause_column: Option<String>,

    /// Category label to average (repeatable; SMED, BAÑO, REFRIGERIO when omitted)
    #[arg(long = "category")]
    pub categories: Vec<String>,

    /// Seconds a fetched feed stays fresh
    #[arg(long, default_value = "300")]
    pub cache_ttl: u64,

    /// Keep running and recompute on every refresh
    #[arg(long)]
    pub watch: bool,

    /// Seconds between refreshes in watch mode (1-3600)
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u32).range(1..=3600))]
    pub refresh_rate: u32,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path (default `~/.floor-metrics/logs/floor-metrics.log`)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

fn parse_cli_date(s: &str) -> Result<NaiveDate, String> {
    DateParser::parse_str(s).ok_or_else(|| format!("invalid date: {s}"))
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.floor-metrics/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_cause_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_ttl: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl LastUsedParams {
    /// Default path: `~/.floor-metrics/last_used.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".floor-metrics").join("last_used.json")
    }

    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Write via a temp file and rename, creating parent directories.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    pub fn clear_at(path: &std::path::Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse process arguments, merged with the persisted last-used values.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Explicit arguments and config path. Values given on the command line
    /// always win over persisted ones; date range and membership filters are
    /// never persisted.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::apply_debug_flag(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        if !is_arg_explicitly_set(&matches, "data_file") && settings.data_file.is_none() {
            settings.data_file = last.data_file;
        }
        if !is_arg_explicitly_set(&matches, "top_n") {
            if let Some(v) = last.top_n {
                settings.top_n = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "root_cause_column")
            && settings.root_cause_column.is_none()
        {
            settings.root_cause_column = last.root_cause_column;
        }
        if !is_arg_explicitly_set(&matches, "categories") {
            if let Some(v) = last.categories {
                settings.categories = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "cache_ttl") {
            if let Some(v) = last.cache_ttl {
                settings.cache_ttl = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "format") {
            if let Some(v) = last.format {
                settings.format = v;
            }
        }

        settings = Self::apply_debug_flag(settings);

        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        settings
    }

    fn apply_debug_flag(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// The event sheet to read, from `--data-file`, the environment or the
    /// last run.
    pub fn data_file(&self) -> crate::Result<&Path> {
        self.data_file.as_deref().ok_or_else(|| {
            FloorError::Config(
                "no event sheet given; pass --data-file or set FLOOR_METRICS_DATA".to_string(),
            )
        })
    }

    /// Classifier for the configured category labels.
    pub fn classifier(&self) -> Classifier {
        if self.categories.is_empty() {
            Classifier::new(DEFAULT_CATEGORIES)
        } else {
            Classifier::new(self.categories.iter().cloned())
        }
    }

    /// Criteria for `dataset`. Omitted factory or machine lists select every
    /// value present in the dataset.
    pub fn filter_criteria(&self, dataset: &Dataset) -> FilterCriteria {
        let factories = if self.factories.is_empty() {
            dataset.distinct_factories()
        } else {
            self.factories.clone()
        };
        let machines = if self.machines.is_empty() {
            dataset.distinct_machines()
        } else {
            self.machines.clone()
        };
        FilterCriteria::new(self.start, self.end, factories, machines)
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            data_file: s.data_file.clone(),
            top_n: Some(s.top_n),
            root_cause_column: s.root_cause_column.clone(),
            categories: if s.categories.is_empty() {
                None
            } else {
                Some(s.categories.clone())
            },
            cache_ttl: Some(s.cache_ttl),
            format: Some(s.format.clone()),
        }
    }
}

/// `true` when `name` was supplied on the command line (not a default or env).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
