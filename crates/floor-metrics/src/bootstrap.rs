use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure the `~/.floor-metrics/` directory hierarchy exists.
///
/// Creates `~/.floor-metrics/` and `~/.floor-metrics/logs/` if absent
/// (including any missing parents).
pub fn ensure_directories() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    ensure_directories_in(&home)
}

/// [`ensure_directories`] rooted at `home`. Returns the application directory.
pub fn ensure_directories_in(home: &Path) -> anyhow::Result<PathBuf> {
    let app_dir = home.join(".floor-metrics");
    std::fs::create_dir_all(app_dir.join("logs"))?;
    Ok(app_dir)
}

/// Log file used when `--log-file` is not given.
pub fn default_log_file(app_dir: &Path) -> PathBuf {
    app_dir.join("logs").join("floor-metrics.log")
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a `--log-level` name to an [`EnvFilter`] directive.
///
/// `CRITICAL` has no tracing counterpart and maps to `error`. Unknown names
/// are passed through so `RUST_LOG`-style directives also work.
pub fn level_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" | "WARN" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        _ => log_level.to_string(),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Everything goes to stderr and is also appended to `log_file` without ANSI
/// colours.
pub fn setup_logging(log_level: &str, log_file: &Path) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(level_directive(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(log_file)?;
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ── ensure_directories ────────────────────────────────────────────────────

    #[test]
    fn test_ensure_directories() {
        let tmp = TempDir::new().expect("tempdir");

        let app_dir = ensure_directories_in(tmp.path()).expect("ensure_directories should succeed");

        assert_eq!(app_dir, tmp.path().join(".floor-metrics"));
        assert!(app_dir.is_dir(), ".floor-metrics dir must exist");
        assert!(app_dir.join("logs").is_dir(), "logs subdir must exist");
        assert!(!app_dir.join("cache").exists(), "no unused cache subdir");
    }

    #[test]
    fn test_default_log_file_lives_in_logs_dir() {
        let tmp = TempDir::new().expect("tempdir");
        let app_dir = ensure_directories_in(tmp.path()).unwrap();

        let log_file = default_log_file(&app_dir);
        assert_eq!(log_file, app_dir.join("logs").join("floor-metrics.log"));
        assert!(log_file.parent().is_some_and(Path::is_dir));
    }

    #[test]
    fn test_ensure_directories_is_idempotent() {
        let tmp = TempDir::new().expect("tempdir");
        ensure_directories_in(tmp.path()).unwrap();
        assert!(ensure_directories_in(tmp.path()).is_ok());
    }

    // ── level_directive ───────────────────────────────────────────────────────

    #[test]
    fn test_level_directive_maps_cli_levels() {
        assert_eq!(level_directive("DEBUG"), "debug");
        assert_eq!(level_directive("INFO"), "info");
        assert_eq!(level_directive("WARNING"), "warn");
        assert_eq!(level_directive("ERROR"), "error");
        assert_eq!(level_directive("CRITICAL"), "error");
    }

    #[test]
    fn test_level_directive_case_insensitive_and_passthrough() {
        assert_eq!(level_directive("warning"), "warn");
        assert_eq!(level_directive("floor_data=trace"), "floor_data=trace");
    }
}
