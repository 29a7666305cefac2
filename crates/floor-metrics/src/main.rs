mod bootstrap;
mod report;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use floor_core::settings::Settings;
use floor_data::analysis::{analyze_dataset, PipelineOutcome};
use floor_data::ingest::{IngestOptions, Ingester};
use floor_data::reader::load_raw_table;
use floor_runtime::clock::SystemClock;
use floor_runtime::data_manager::{DataManager, JsonFileSource};
use floor_runtime::orchestrator::RefreshOrchestrator;

use crate::report::{render_outcome, render_snapshot, OutputFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    let app_dir = bootstrap::ensure_directories()?;
    let log_file = settings
        .log_file
        .clone()
        .unwrap_or_else(|| bootstrap::default_log_file(&app_dir));
    bootstrap::setup_logging(&settings.log_level, &log_file)?;

    tracing::info!("floor-metrics v{} starting", env!("CARGO_PKG_VERSION"));

    let data_file = settings.data_file()?.to_path_buf();
    let format = OutputFormat::from_name(&settings.format);

    if settings.watch {
        run_watch(&settings, &data_file, format).await
    } else {
        let outcome = run_once(&settings, &data_file)?;
        println!("{}", render_outcome(&outcome, format)?);
        Ok(())
    }
}

fn ingester(settings: &Settings) -> Ingester {
    Ingester::new(IngestOptions {
        root_cause_column: settings.root_cause_column.clone(),
        classifier: settings.classifier(),
    })
}

/// Load, ingest and analyse the sheet once.
///
/// Unreadable files are errors; a sheet with the wrong shape is reported as
/// an outcome.
fn run_once(settings: &Settings, data_file: &Path) -> Result<PipelineOutcome> {
    let table = load_raw_table(data_file)?;
    tracing::info!("Loaded {} rows from {}", table.len(), data_file.display());

    let dataset = match ingester(settings).ingest(&table) {
        Ok(dataset) => dataset,
        Err(e) if e.is_schema_error() => {
            return Ok(PipelineOutcome::SchemaError {
                message: e.to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    let criteria = settings.filter_criteria(&dataset);
    Ok(analyze_dataset(&dataset, &criteria, settings.top_n))
}

/// Recompute every `--refresh-rate` seconds until Ctrl+C.
async fn run_watch(settings: &Settings, data_file: &Path, format: OutputFormat) -> Result<()> {
    tracing::info!(
        "Watching {} every {}s (cache TTL {}s)",
        data_file.display(),
        settings.refresh_rate,
        settings.cache_ttl
    );

    let manager = DataManager::with_clock(
        JsonFileSource::new(data_file),
        settings.cache_ttl,
        SystemClock,
        ingester(settings),
    );

    let criteria_settings = settings.clone();
    let orchestrator = RefreshOrchestrator::new(
        Duration::from_secs(u64::from(settings.refresh_rate)),
        settings.top_n,
        move |dataset| criteria_settings.filter_criteria(dataset),
    );
    let (mut rx, handle) = orchestrator.start(manager);

    loop {
        tokio::select! {
            snapshot = rx.recv() => {
                let Some(snapshot) = snapshot else { break };
                println!("{}", render_snapshot(&snapshot, format)?);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received; stopping refresh task");
                break;
            }
        }
    }

    handle.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn settings(extra: &[&str]) -> Settings {
        Settings::parse_from(std::iter::once("floor-metrics").chain(extra.iter().copied()))
    }

    fn write_sheet(dir: &TempDir, doc: serde_json::Value) -> std::path::PathBuf {
        let path = dir.path().join("sheet.json");
        std::fs::write(&path, doc.to_string()).unwrap();
        path
    }

    #[test]
    fn test_run_once_defaults_to_every_factory_and_machine() {
        let dir = TempDir::new().unwrap();
        let path = write_sheet(
            &dir,
            serde_json::json!([
                ["Fecha", "Operador", "Evento", "Fábrica", "Máquina", "Tiempo (Min)", "Nivel Evento 6"],
                ["01/01/2024", "Ana", "Producción", "F1", "M1", "10", null],
                ["02/01/2024", "Luis", "Producción", "F2", "M2", "4", null],
            ]),
        );

        let outcome = run_once(&settings(&[]), &path).unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.metrics.total_count, 2);
        assert_eq!(report.metrics.total_production, 14.0);
    }

    #[test]
    fn test_run_once_honours_cli_filters() {
        let dir = TempDir::new().unwrap();
        let path = write_sheet(
            &dir,
            serde_json::json!([
                ["Fecha", "Operador", "Evento", "Fábrica", "Máquina", "Tiempo (Min)", "Nivel Evento 6"],
                ["01/01/2024", "Ana", "Producción", "F1", "M1", "10", null],
                ["02/01/2024", "Luis", "Producción", "F2", "M2", "4", null],
            ]),
        );

        let s = settings(&["--factory", "F2", "--start", "02/01/2024", "--end", "2024-01-31"]);
        let outcome = run_once(&s, &path).unwrap();
        assert_eq!(outcome.report().unwrap().metrics.total_production, 4.0);

        let halted = run_once(&settings(&["--start", "01/01/2024"]), &path).unwrap();
        assert!(matches!(halted, PipelineOutcome::Halted(_)));
    }

    #[test]
    fn test_run_once_schema_error_is_an_outcome() {
        let dir = TempDir::new().unwrap();
        let path = write_sheet(&dir, serde_json::json!([["Fecha", "Operador"]]));
        let outcome = run_once(&settings(&[]), &path).unwrap();
        assert!(matches!(outcome, PipelineOutcome::SchemaError { .. }));
    }

    #[test]
    fn test_run_once_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(run_once(&settings(&[]), &dir.path().join("absent.json")).is_err());
    }
}
