//! Loading of the raw event sheet from a JSON export.
//!
//! Two shapes are accepted: a bare array of arrays whose first element is
//! the header row, or an object carrying that array under `"values"` (the
//! layout of a spreadsheet values export).

use std::path::Path;

use floor_core::data_processors::CellText;
use floor_core::models::RawTable;
use floor_core::{FloorError, Result};
use serde_json::Value;
use tracing::{debug, warn};

// ── Public API ────────────────────────────────────────────────────────────────

/// Read and parse the JSON export at `path`.
pub fn load_raw_table(path: &Path) -> Result<RawTable> {
    let content = std::fs::read_to_string(path).map_err(|source| FloorError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&content)?;
    let table = parse_raw_table(value)?;

    debug!(
        "Loaded {} rows x {} columns from {}",
        table.rows.len(),
        table.headers.len(),
        path.display()
    );
    Ok(table)
}

/// Convert an already-decoded JSON document into a [`RawTable`].
pub fn parse_raw_table(value: Value) -> Result<RawTable> {
    let rows = match value {
        Value::Array(rows) => rows,
        Value::Object(mut map) => match map.remove("values") {
            Some(Value::Array(rows)) => rows,
            _ => {
                return Err(FloorError::MalformedTable(
                    "object has no \"values\" array".to_string(),
                ))
            }
        },
        _ => {
            return Err(FloorError::MalformedTable(
                "expected an array of rows".to_string(),
            ))
        }
    };

    let mut rows = rows.into_iter();
    let headers: Vec<String> = match rows.next() {
        Some(Value::Array(cells)) => cells
            .iter()
            .map(|c| CellText::extract(c).unwrap_or_default())
            .collect(),
        _ => return Err(FloorError::MalformedTable("no header row".to_string())),
    };

    let width = headers.len();
    let mut body = Vec::new();
    for (i, row) in rows.enumerate() {
        match row {
            Value::Array(mut cells) => {
                cells.truncate(width);
                body.push(cells);
            }
            other => {
                warn!("Skipping non-array row {}: {}", i + 1, other);
            }
        }
    }

    Ok(RawTable::new(headers, body))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    // ── parse_raw_table ───────────────────────────────────────────────────────

    #[test]
    fn test_parse_array_of_arrays() {
        let table = parse_raw_table(json!([
            ["Fecha", "Operador"],
            ["01/01/2024", "Ana"],
            ["02/01/2024", "Luis"],
        ]))
        .unwrap();

        assert_eq!(table.headers, vec!["Fecha", "Operador"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.cell(1, 1), &json!("Luis"));
    }

    #[test]
    fn test_parse_values_object() {
        let table = parse_raw_table(json!({
            "range": "Hoja1!A1:B2",
            "values": [["Fecha", "Operador"], ["01/01/2024", "Ana"]],
        }))
        .unwrap();
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn test_parse_truncates_long_rows_and_skips_non_arrays() {
        let table = parse_raw_table(json!([
            ["a", "b"],
            ["1", "2", "3"],
            "garbage",
            ["4"],
        ]))
        .unwrap();
        assert_eq!(table.rows, vec![vec![json!("1"), json!("2")], vec![json!("4")]]);
    }

    #[test]
    fn test_parse_rejects_empty_and_scalars() {
        assert!(matches!(
            parse_raw_table(json!([])),
            Err(FloorError::MalformedTable(_))
        ));
        assert!(matches!(
            parse_raw_table(json!({"rows": []})),
            Err(FloorError::MalformedTable(_))
        ));
        assert!(matches!(
            parse_raw_table(json!("text")),
            Err(FloorError::MalformedTable(_))
        ));
    }

    // ── load_raw_table ────────────────────────────────────────────────────────

    #[test]
    fn test_load_raw_table_from_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            dir.path(),
            "feed.json",
            r#"[["Fecha","Tiempo (Min)"],["01/01/2024","10,5"]]"#,
        );
        let table = load_raw_table(&path).unwrap();
        assert_eq!(table.headers, vec!["Fecha", "Tiempo (Min)"]);
        assert_eq!(table.cell(0, 1), &json!("10,5"));
    }

    #[test]
    fn test_load_raw_table_missing_file() {
        let err = load_raw_table(Path::new("/tmp/does-not-exist-floor-feed.json")).unwrap_err();
        assert!(matches!(err, FloorError::FileRead { .. }));
    }

    #[test]
    fn test_load_raw_table_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "feed.json", "[[\"Fecha\"");
        let err = load_raw_table(&path).unwrap_err();
        assert!(matches!(err, FloorError::JsonParse(_)));
    }
}
