use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::debug;

// ── CellText ──────────────────────────────────────────────────────────────────

/// Renders raw feed cells as text.
pub struct CellText;

impl CellText {
    /// Text of a cell, trimmed. `null` and blank strings become `None`.
    pub fn extract(value: &Value) -> Option<String> {
        let text = match value {
            Value::Null => return None,
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            // Nested values never appear in a flat sheet export.
            other => other.to_string(),
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

// ── TimeParser ────────────────────────────────────────────────────────────────

/// Parses the `Tiempo (Min)` column, accepting either decimal separator.
pub struct TimeParser;

impl TimeParser {
    /// Minutes as a non-negative float; anything unparsable becomes `0.0`.
    pub fn parse(value: &Value) -> f64 {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => Self::parse_str(s),
            _ => None,
        };
        match parsed {
            // `+ 0.0` turns a parsed "-0" into positive zero.
            Some(v) if v.is_finite() && v >= 0.0 => v + 0.0,
            Some(v) => {
                debug!("TimeParser: out-of-range minutes {} replaced with 0", v);
                0.0
            }
            None => 0.0,
        }
    }

    /// Replace every decimal comma with a point, then parse.
    pub fn parse_str(s: &str) -> Option<f64> {
        let normalised = s.trim().replace(',', ".");
        if normalised.is_empty() {
            return None;
        }
        normalised.parse::<f64>().ok()
    }
}

// ── DateParser ────────────────────────────────────────────────────────────────

/// Parses the `Fecha` column using the day-before-month convention.
pub struct DateParser;

impl DateParser {
    /// Two-digit years come first: `%Y` would read "24" as the year 24.
    const DATE_FORMATS: &'static [&'static str] = &[
        "%d/%m/%y",
        "%d-%m-%y",
        "%d.%m.%y",
        "%d/%m/%Y",
        "%d-%m-%Y",
        "%d.%m.%Y",
        "%Y-%m-%d",
    ];
    const TIME_SUFFIXES: &'static [&'static str] = &["", " %H:%M", " %H:%M:%S"];
    const ISO_T_FORMATS: &'static [&'static str] =
        &["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];
    /// Years before this are treated as truncated input, not real dates.
    const MIN_YEAR: i32 = 1000;

    /// Calendar date of a cell; time-of-day is dropped. `None` on failure.
    pub fn parse(value: &Value) -> Option<NaiveDate> {
        match value {
            Value::String(s) => Self::parse_str(s),
            _ => None,
        }
    }

    pub fn parse_str(s: &str) -> Option<NaiveDate> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        let with_time = Self::DATE_FORMATS.iter().flat_map(|date_fmt| {
            Self::TIME_SUFFIXES
                .iter()
                .map(move |suffix| format!("{date_fmt}{suffix}"))
        });
        let iso_t = Self::ISO_T_FORMATS.iter().map(|fmt| fmt.to_string());

        for fmt in with_time.chain(iso_t) {
            if let Some(date) = Self::try_format(s, &fmt) {
                if date.year() < Self::MIN_YEAR {
                    debug!("DateParser: implausible year in \"{}\"", s);
                    return None;
                }
                return Some(date);
            }
        }

        debug!("DateParser: could not parse date \"{}\"", s);
        None
    }

    fn try_format(s: &str, fmt: &str) -> Option<NaiveDate> {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.date());
        }
        NaiveDate::parse_from_str(s, fmt).ok()
    }
}
