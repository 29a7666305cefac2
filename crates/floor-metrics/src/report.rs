//! Text and JSON rendering of pipeline outcomes.

use std::fmt::Write;

use floor_core::models::{Aggregations, MetricResult, Pivot, RootCauseSource};
use floor_data::analysis::{PipelineOutcome, Report};
use floor_runtime::orchestrator::Snapshot;

/// Output format selected with `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    /// Anything other than `json` renders as text.
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("json") {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

// ── Entry points ──────────────────────────────────────────────────────────────

pub fn render_outcome(outcome: &PipelineOutcome, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(outcome)?),
        OutputFormat::Text => Ok(outcome_text(outcome)),
    }
}

pub fn render_snapshot(snapshot: &Snapshot, format: OutputFormat) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string(snapshot)?);
    }

    let mut out = format!("── Refresh #{} ──\n", snapshot.sequence);
    if let Some(error) = &snapshot.error {
        let _ = writeln!(out, "warning: {error}");
    }
    match &snapshot.outcome {
        Some(outcome) => out.push_str(&outcome_text(outcome)),
        None => out.push_str("No data available yet.\n"),
    }
    Ok(out)
}

// ── Text rendering ────────────────────────────────────────────────────────────

fn outcome_text(outcome: &PipelineOutcome) -> String {
    match outcome {
        PipelineOutcome::Ready(report) => report_text(report),
        PipelineOutcome::Halted(halted) => {
            format!("Analysis halted: {halted}. Pass both --start and --end, or neither.\n")
        }
        PipelineOutcome::Empty { records_ingested } => format!(
            "No records match the selected filters ({records_ingested} records loaded).\n"
        ),
        PipelineOutcome::SchemaError { message } => {
            format!("The event sheet could not be read: {message}\n")
        }
    }
}

fn report_text(report: &Report) -> String {
    let mut out = String::new();
    let meta = &report.metadata;

    let _ = writeln!(
        out,
        "{} of {} records selected (root cause from {})",
        meta.records_selected,
        meta.records_ingested,
        source_label(&meta.root_cause_source)
    );
    out.push('\n');
    write_metrics(&mut out, &report.metrics);
    write_aggregations(&mut out, &report.aggregations);
    out
}

fn source_label(source: &RootCauseSource) -> String {
    match source {
        RootCauseSource::Configured { column } => format!("configured column \"{column}\""),
        RootCauseSource::Level6 => "\"Nivel Evento 6\"".to_string(),
        RootCauseSource::Positional { index, column } => {
            format!("column {} \"{column}\" (positional fallback)", index + 1)
        }
    }
}

fn write_metrics(out: &mut String, metrics: &MetricResult) {
    let _ = writeln!(out, "Summary");
    let _ = writeln!(out, "  {:<28}{:>10}", "Records", metrics.total_count);
    let _ = writeln!(out, "  {:<28}{:>10.2}", "Production minutes", metrics.total_production);
    let _ = writeln!(out, "  {:<28}{:>10.2}", "Failure minutes", metrics.total_failures);
    for (label, average) in &metrics.category_averages {
        let _ = writeln!(out, "  {:<28}{:>10.2}", format!("Average {label}"), average);
    }
    out.push('\n');
}

fn write_aggregations(out: &mut String, aggregations: &Aggregations) {
    let _ = writeln!(out, "Minutes by event");
    for group in &aggregations.by_event {
        let _ = writeln!(out, "  {:<28}{:>10.2}", group.key, group.minutes);
    }
    out.push('\n');

    let _ = writeln!(out, "Minutes by operator and event");
    for group in &aggregations.by_operator_event {
        let label = format!("{} / {}", group.key.operator, group.key.event);
        let _ = writeln!(out, "  {:<28}{:>10.2}", label, group.minutes);
    }
    out.push('\n');

    let _ = writeln!(out, "Top root causes");
    if aggregations.top_root_causes.is_empty() {
        let _ = writeln!(out, "  (no failures recorded)");
    }
    for (rank, group) in aggregations.top_root_causes.iter().enumerate() {
        let _ = writeln!(out, "  {:>2}. {:<24}{:>10.2}", rank + 1, group.key, group.minutes);
    }
    out.push('\n');

    write_pivot(out, &aggregations.machine_root_cause_pivot);
}

fn write_pivot(out: &mut String, pivot: &Pivot) {
    let _ = writeln!(out, "Stoppage minutes by machine and root cause");
    if pivot.is_empty() {
        let _ = writeln!(out, "  (no stoppages recorded)");
        return;
    }

    let _ = write!(out, "  {:<16}", "");
    for cause in &pivot.causes {
        let _ = write!(out, "{:>14}", truncate(cause, 13));
    }
    let _ = writeln!(out, "{:>14}", "Total");

    for (machine, row) in pivot.machines.iter().zip(&pivot.values) {
        let _ = write!(out, "  {:<16}", truncate(machine, 15));
        for value in row {
            let _ = write!(out, "{:>14.2}", value);
        }
        let _ = writeln!(out, "{:>14.2}", row.iter().sum::<f64>());
    }
}

fn truncate(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        label.to_string()
    } else {
        let mut cut: String = label.chars().take(max_chars.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
