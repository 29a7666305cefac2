//! Normalisation of raw sheet rows into typed [`EventRecord`]s.
//!
//! The schema is validated once, before any row is touched: required columns
//! must be present and the root-cause column is resolved up front. Per-row
//! problems are never fatal. Unparsable minutes become `0.0`, unparsable
//! dates become `None`, and rows without an operator or event are dropped.

use floor_core::classification::Classifier;
use floor_core::data_processors::{CellText, DateParser, TimeParser};
use floor_core::models::{
    Dataset, EventRecord, RawTable, RootCauseSource, COL_DATE, COL_EVENT, COL_FACTORY,
    COL_LEVEL3, COL_LEVEL4, COL_LEVEL5, COL_LEVEL6, COL_MACHINE, COL_OPERATOR, COL_TIME,
    POSITIONAL_ROOT_CAUSE_INDEX, REQUIRED_COLUMNS,
};
use floor_core::{FloorError, Result};
use tracing::{debug, warn};

// ── IngestOptions ─────────────────────────────────────────────────────────────

/// Knobs for [`Ingester`].
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Column to read the root cause from instead of `Nivel Evento 6`.
    pub root_cause_column: Option<String>,
    /// Category labels to tag records with.
    pub classifier: Classifier,
}

// ── ColumnMap ─────────────────────────────────────────────────────────────────

/// Header positions resolved once per table.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnMap {
    date: usize,
    operator: usize,
    event: usize,
    factory: usize,
    machine: usize,
    time: usize,
    level3: Option<usize>,
    level4: Option<usize>,
    level5: Option<usize>,
    level6: Option<usize>,
    root_cause: usize,
    root_cause_source: RootCauseSource,
    extras: Vec<usize>,
}

impl ColumnMap {
    fn resolve(table: &RawTable, configured_root_cause: Option<&str>) -> Result<Self> {
        let level6 = table.column_index(COL_LEVEL6);
        let (root_cause, root_cause_source) = match configured_root_cause {
            Some(column) => {
                let index = table.column_index(column).ok_or_else(|| {
                    FloorError::RootCauseColumn(format!("configured column \"{column}\" not found"))
                })?;
                (
                    index,
                    RootCauseSource::Configured {
                        column: column.to_string(),
                    },
                )
            }
            None => match level6 {
                Some(index) => (index, RootCauseSource::Level6),
                None if table.headers.len() > POSITIONAL_ROOT_CAUSE_INDEX => {
                    let column = table.headers[POSITIONAL_ROOT_CAUSE_INDEX].clone();
                    warn!(
                        "No \"{}\" column; using column {} (\"{}\") as root cause",
                        COL_LEVEL6,
                        POSITIONAL_ROOT_CAUSE_INDEX + 1,
                        column
                    );
                    (
                        POSITIONAL_ROOT_CAUSE_INDEX,
                        RootCauseSource::Positional {
                            index: POSITIONAL_ROOT_CAUSE_INDEX,
                            column,
                        },
                    )
                }
                None => {
                    return Err(FloorError::RootCauseColumn(format!(
                        "no \"{}\" column and only {} columns for the positional fallback",
                        COL_LEVEL6,
                        table.headers.len()
                    )))
                }
            },
        };

        if let Some(missing) = REQUIRED_COLUMNS
            .iter()
            .find(|name| table.column_index(name).is_none())
        {
            return Err(FloorError::MissingColumn((*missing).to_string()));
        }
        // Presence was checked above.
        let required = |name: &str| table.column_index(name).unwrap_or_default();

        let mut map = ColumnMap {
            date: required(COL_DATE),
            operator: required(COL_OPERATOR),
            event: required(COL_EVENT),
            factory: required(COL_FACTORY),
            machine: required(COL_MACHINE),
            time: required(COL_TIME),
            level3: table.column_index(COL_LEVEL3),
            level4: table.column_index(COL_LEVEL4),
            level5: table.column_index(COL_LEVEL5),
            level6,
            root_cause,
            root_cause_source,
            extras: Vec::new(),
        };
        map.extras = (0..table.headers.len())
            .filter(|i| !map.is_known(*i))
            .collect();
        Ok(map)
    }

    fn is_known(&self, index: usize) -> bool {
        [
            self.date,
            self.operator,
            self.event,
            self.factory,
            self.machine,
            self.time,
        ]
        .contains(&index)
            || [self.level3, self.level4, self.level5, self.level6].contains(&Some(index))
    }
}

// ── Ingester ──────────────────────────────────────────────────────────────────

/// Turns a [`RawTable`] into a validated [`Dataset`].
#[derive(Debug, Clone, Default)]
pub struct Ingester {
    options: IngestOptions,
}

impl Ingester {
    pub fn new(options: IngestOptions) -> Self {
        Self { options }
    }

    /// Validate the schema, then normalise every row.
    ///
    /// Fails only with a schema error; the input table is left untouched.
    pub fn ingest(&self, table: &RawTable) -> Result<Dataset> {
        let columns = ColumnMap::resolve(table, self.options.root_cause_column.as_deref())?;

        let mut records = Vec::with_capacity(table.len());
        let mut dropped = 0usize;
        let mut undated = 0usize;

        for row in 0..table.len() {
            match self.normalise_row(table, row, &columns) {
                Some(record) => {
                    if record.date.is_none() {
                        undated += 1;
                    }
                    records.push(record);
                }
                None => dropped += 1,
            }
        }

        debug!(
            "Ingested {} rows: {} kept, {} dropped, {} without a date",
            table.len(),
            records.len(),
            dropped,
            undated
        );

        Ok(Dataset {
            records,
            root_cause_source: columns.root_cause_source,
            category_labels: self.options.classifier.labels().to_vec(),
        })
    }

    /// `None` when the row has no operator or no event.
    fn normalise_row(&self, table: &RawTable, row: usize, columns: &ColumnMap) -> Option<EventRecord> {
        let text = |col: usize| CellText::extract(table.cell(row, col));

        let operator = text(columns.operator)?;
        let event = text(columns.event)?;

        let mut record = EventRecord {
            date: DateParser::parse(table.cell(row, columns.date)),
            operator,
            event,
            factory: text(columns.factory).unwrap_or_default(),
            machine: text(columns.machine).unwrap_or_default(),
            time_minutes: TimeParser::parse(table.cell(row, columns.time)),
            level3: columns.level3.and_then(text),
            level4: columns.level4.and_then(text),
            level5: columns.level5.and_then(text),
            level6: columns.level6.and_then(text),
            root_cause: text(columns.root_cause),
            extra_fields: columns.extras.iter().filter_map(|&i| text(i)).collect(),
            tags: Default::default(),
        };
        record.tags = self.options.classifier.tag(&record);
        Some(record)
    }
}

/// Ingest with default options: `Nivel Evento 6` (or the positional
/// fallback) as root cause and the default category labels.
pub fn ingest(table: &RawTable) -> Result<Dataset> {
    Ingester::default().ingest(table)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
