use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ── Wire column names ─────────────────────────────────────────────────────────

pub const COL_DATE: &str = "Fecha";
pub const COL_OPERATOR: &str = "Operador";
pub const COL_EVENT: &str = "Evento";
pub const COL_FACTORY: &str = "Fábrica";
pub const COL_MACHINE: &str = "Máquina";
pub const COL_TIME: &str = "Tiempo (Min)";
pub const COL_LEVEL3: &str = "Nivel Evento 3";
pub const COL_LEVEL4: &str = "Nivel Evento 4";
pub const COL_LEVEL5: &str = "Nivel Evento 5";
pub const COL_LEVEL6: &str = "Nivel Evento 6";

/// Columns every feed must carry.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    COL_DATE,
    COL_OPERATOR,
    COL_EVENT,
    COL_FACTORY,
    COL_MACHINE,
    COL_TIME,
];

/// Zero-based position of the column used as root cause when no
/// `Nivel Evento 6` column is present.
pub const POSITIONAL_ROOT_CAUSE_INDEX: usize = 5;

// ── RawTable ──────────────────────────────────────────────────────────────────

/// Already-materialised rows of the upstream feed: a header plus value rows.
///
/// Cells are JSON scalars as delivered by the collaborator. Rows shorter than
/// the header are treated as having trailing nulls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { headers, rows }
    }

    /// Position of the column whose (trimmed) header equals `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    /// Cell at `(row, col)`, or `Value::Null` when the row is short.
    pub fn cell(&self, row: usize, col: usize) -> &Value {
        static NULL: Value = Value::Null;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&NULL)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ── EventRecord ───────────────────────────────────────────────────────────────

/// One observed production-floor event after normalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Calendar date of the event; `None` when the source text was unparsable.
    pub date: Option<NaiveDate>,
    pub operator: String,
    pub event: String,
    pub factory: String,
    pub machine: String,
    /// Duration in minutes, never negative.
    pub time_minutes: f64,
    #[serde(default)]
    pub level3: Option<String>,
    #[serde(default)]
    pub level4: Option<String>,
    #[serde(default)]
    pub level5: Option<String>,
    #[serde(default)]
    pub level6: Option<String>,
    /// Root-cause key taken from the column resolved at ingestion.
    #[serde(default)]
    pub root_cause: Option<String>,
    /// Text of feed columns outside the known schema, in header order.
    #[serde(default)]
    pub extra_fields: Vec<String>,
    /// Category labels that matched somewhere in the row at ingestion.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl EventRecord {
    /// Build a record with only the mandatory fields populated.
    pub fn new(
        date: Option<NaiveDate>,
        operator: impl Into<String>,
        event: impl Into<String>,
        factory: impl Into<String>,
        machine: impl Into<String>,
        time_minutes: f64,
    ) -> Self {
        Self {
            date,
            operator: operator.into(),
            event: event.into(),
            factory: factory.into(),
            machine: machine.into(),
            time_minutes,
            level3: None,
            level4: None,
            level5: None,
            level6: None,
            root_cause: None,
            extra_fields: Vec::new(),
            tags: BTreeSet::new(),
        }
    }

    /// Every field rendered as text, the way a whole-row scan sees it.
    pub fn field_texts(&self) -> Vec<String> {
        let mut texts = Vec::with_capacity(12 + self.extra_fields.len());
        if let Some(d) = self.date {
            texts.push(d.format("%Y-%m-%d").to_string());
        }
        texts.push(self.operator.clone());
        texts.push(self.event.clone());
        texts.push(self.factory.clone());
        texts.push(self.machine.clone());
        texts.push(self.time_minutes.to_string());
        for level in [&self.level3, &self.level4, &self.level5, &self.level6]
            .into_iter()
            .flatten()
        {
            texts.push(level.clone());
        }
        texts.extend(self.extra_fields.iter().cloned());
        texts
    }
}

// ── Dataset ───────────────────────────────────────────────────────────────────

/// Where the root-cause key of each record was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RootCauseSource {
    /// A column named explicitly in configuration.
    Configured { column: String },
    /// The `Nivel Evento 6` column.
    Level6,
    /// The column at [`POSITIONAL_ROOT_CAUSE_INDEX`], whatever its name.
    Positional { index: usize, column: String },
}

/// The typed, validated output of ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub records: Vec<EventRecord>,
    pub root_cause_source: RootCauseSource,
    /// Labels every record was checked against when computing `tags`.
    pub category_labels: Vec<String>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sorted distinct factory names.
    pub fn distinct_factories(&self) -> Vec<String> {
        distinct(self.records.iter().map(|r| r.factory.as_str()))
    }

    /// Sorted distinct machine names.
    pub fn distinct_machines(&self) -> Vec<String> {
        distinct(self.records.iter().map(|r| r.machine.as_str()))
    }

    /// Earliest and latest non-null dates, or `None` when no record has one.
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = self.records.iter().filter_map(|r| r.date);
        let first = dates.next()?;
        Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

// ── Filtering ─────────────────────────────────────────────────────────────────

/// Caller-supplied filter parameters.
///
/// Date endpoints are kept exactly as supplied; a half-open pair is only
/// rejected when the criteria are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub factories: BTreeSet<String>,
    pub machines: BTreeSet<String>,
}

impl FilterCriteria {
    pub fn new<F, M>(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        factories: F,
        machines: M,
    ) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Self {
            start,
            end,
            factories: factories.into_iter().map(Into::into).collect(),
            machines: machines.into_iter().map(Into::into).collect(),
        }
    }
}

/// The pipeline stopped because the date range had exactly one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("date range needs both a start and an end (got {missing} missing)")]
pub struct FilterHalted {
    pub missing: MissingEndpoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingEndpoint {
    Start,
    End,
}

impl fmt::Display for MissingEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingEndpoint::Start => f.write_str("start"),
            MissingEndpoint::End => f.write_str("end"),
        }
    }
}

/// Records of a [`Dataset`] that passed a [`FilterCriteria`], in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilteredView {
    pub records: Vec<EventRecord>,
    pub category_labels: Vec<String>,
}

impl FilteredView {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ── Results ───────────────────────────────────────────────────────────────────

pub const METRIC_TOTAL_COUNT: &str = "total_count";
pub const METRIC_TOTAL_PRODUCTION: &str = "total_production";
pub const METRIC_TOTAL_FAILURES: &str = "total_failures";

/// Scalar summary metrics over a [`FilteredView`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub total_count: usize,
    pub total_production: f64,
    pub total_failures: f64,
    /// `(label, mean minutes)` per reported category, in configured order.
    pub category_averages: Vec<(String, f64)>,
}

impl MetricResult {
    /// Average for `label`, or `None` if it was not reported.
    pub fn category_average(&self, label: &str) -> Option<f64> {
        self.category_averages
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| *v)
    }

    /// Flatten into a metric-name → value map.
    pub fn as_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert(METRIC_TOTAL_COUNT.to_string(), self.total_count as f64);
        map.insert(METRIC_TOTAL_PRODUCTION.to_string(), self.total_production);
        map.insert(METRIC_TOTAL_FAILURES.to_string(), self.total_failures);
        for (label, value) in &self.category_averages {
            map.insert(format!("average_{}", label.to_lowercase()), *value);
        }
        map
    }
}

/// One group of an aggregation and its summed minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSum<K> {
    pub key: K,
    pub minutes: f64,
}

/// Ordered `(key, minutes)` pairs.
pub type AggregationResult<K> = Vec<GroupSum<K>>;

/// Grouping key for the operator/event breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperatorEvent {
    pub operator: String,
    pub event: String,
}

/// Dense Machine × root-cause matrix of summed minutes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    /// Row labels (machines), ascending.
    pub machines: Vec<String>,
    /// Column labels (root causes), ascending.
    pub causes: Vec<String>,
    /// `values[row][col]`; absent combinations are `0.0`.
    pub values: Vec<Vec<f64>>,
}

impl Pivot {
    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    /// Cell value, or `None` when either label is unknown.
    pub fn get(&self, machine: &str, cause: &str) -> Option<f64> {
        let row = self.machines.iter().position(|m| m == machine)?;
        let col = self.causes.iter().position(|c| c == cause)?;
        Some(self.values[row][col])
    }

    pub fn row_total(&self, machine: &str) -> Option<f64> {
        let row = self.machines.iter().position(|m| m == machine)?;
        Some(self.values[row].iter().sum())
    }

    pub fn column_total(&self, cause: &str) -> Option<f64> {
        let col = self.causes.iter().position(|c| c == cause)?;
        Some(self.values.iter().map(|row| row[col]).sum())
    }
}

/// Every aggregation the presentation layer consumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregations {
    pub by_event: AggregationResult<String>,
    pub by_operator_event: AggregationResult<OperatorEvent>,
    pub top_root_causes: AggregationResult<String>,
    pub machine_root_cause_pivot: Pivot,
}
