use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the floor metrics crates.
#[derive(Error, Debug)]
pub enum FloorError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A required column is absent from the raw table header.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// The root-cause column could not be resolved by name or by position.
    #[error("No root-cause column: {0}")]
    RootCauseColumn(String),

    /// The raw feed does not have the expected tabular shape.
    #[error("Malformed raw table: {0}")]
    MalformedTable(String),

    /// The upstream feed could not be fetched.
    #[error("Feed unavailable: {0}")]
    FeedUnavailable(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FloorError {
    /// `true` for errors caused by the shape of the input rather than by its
    /// transport. Schema errors are fatal and never worth retrying.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            FloorError::MissingColumn(_)
                | FloorError::RootCauseColumn(_)
                | FloorError::MalformedTable(_)
        )
    }
}

/// Convenience alias used throughout the floor crates.
pub type Result<T> = std::result::Result<T, FloorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = FloorError::FileRead {
            path: PathBuf::from("/some/feed.json"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/some/feed.json"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_missing_column() {
        let err = FloorError::MissingColumn("Operador".to_string());
        assert_eq!(err.to_string(), "Missing required column: Operador");
    }

    #[test]
    fn test_error_display_root_cause_column() {
        let err = FloorError::RootCauseColumn("table has 4 columns".to_string());
        assert_eq!(err.to_string(), "No root-cause column: table has 4 columns");
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: FloorError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: FloorError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_is_schema_error() {
        assert!(FloorError::MissingColumn("Fecha".into()).is_schema_error());
        assert!(FloorError::RootCauseColumn("x".into()).is_schema_error());
        assert!(FloorError::MalformedTable("x".into()).is_schema_error());
        assert!(!FloorError::FeedUnavailable("timeout".into()).is_schema_error());
        assert!(!FloorError::Config("x".into()).is_schema_error());
    }
}
