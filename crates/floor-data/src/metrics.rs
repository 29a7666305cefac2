//! Scalar summary metrics over a filtered view.

use floor_core::classification::{is_failure, is_production, row_matches};
use floor_core::models::{EventRecord, FilteredView, MetricResult};

// ── MetricsCalculator ─────────────────────────────────────────────────────────

/// Stateless collection of metric calculations. Every metric is `0` on an
/// empty view.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Totals plus the average of every category label the view was tagged
    /// with at ingestion.
    pub fn compute(view: &FilteredView) -> MetricResult {
        MetricResult {
            total_count: view.len(),
            total_production: Self::total_production(view),
            total_failures: Self::total_failures(view),
            category_averages: view
                .category_labels
                .iter()
                .map(|label| (label.clone(), Self::category_average(view, label)))
                .collect(),
        }
    }

    /// Minutes of events whose `Evento` mentions production.
    pub fn total_production(view: &FilteredView) -> f64 {
        sum_minutes(view.records.iter().filter(|r| is_production(r)))
    }

    /// Minutes of events whose level 3 mentions a failure.
    pub fn total_failures(view: &FilteredView) -> f64 {
        sum_minutes(view.records.iter().filter(|r| is_failure(r)))
    }

    /// Mean minutes over records with `pattern` in any field; `0.0` when no
    /// record matches.
    ///
    /// Labels tagged at ingestion are answered from the tags. Any other
    /// pattern scans the whole row.
    pub fn category_average(view: &FilteredView, pattern: &str) -> f64 {
        let tagged = view.category_labels.iter().any(|l| l == pattern);
        let matches = |r: &&EventRecord| {
            if tagged {
                r.tags.contains(pattern)
            } else {
                row_matches(r, pattern)
            }
        };

        let (sum, count) = view
            .records
            .iter()
            .filter(matches)
            .fold((0.0, 0usize), |(sum, count), r| (sum + r.time_minutes, count + 1));

        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }
}

fn sum_minutes<'a>(records: impl Iterator<Item = &'a EventRecord>) -> f64 {
    records.map(|r| r.time_minutes).sum()
}

/// Compute the summary metrics of `view`.
pub fn metrics(view: &FilteredView) -> MetricResult {
    MetricsCalculator::compute(view)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use floor_core::classification::Classifier;

    /// Build a view the way ingestion would, tags included.
    fn view(records: Vec<EventRecord>) -> FilteredView {
        let classifier = Classifier::default();
        let records = records
            .into_iter()
            .map(|mut r| {
                r.tags = classifier.tag(&r);
                r
            })
            .collect();
        FilteredView {
            records,
            category_labels: classifier.labels().to_vec(),
        }
    }

    fn rec(operator: &str, event: &str, minutes: f64) -> EventRecord {
        EventRecord::new(None, operator, event, "F1", "M1", minutes)
    }

    fn with_level3(mut r: EventRecord, level3: &str) -> EventRecord {
        r.level3 = Some(level3.to_string());
        r
    }

    // ── empty view ────────────────────────────────────────────────────────────

    #[test]
    fn test_empty_view_is_all_zero() {
        let result = metrics(&view(vec![]));
        assert_eq!(result.total_count, 0);
        assert_eq!(result.total_production, 0.0);
        assert_eq!(result.total_failures, 0.0);
        assert_eq!(result.category_averages.len(), 3);
        assert!(result.category_averages.iter().all(|(_, v)| *v == 0.0));
    }

    // ── totals ────────────────────────────────────────────────────────────────

    #[test]
    fn test_total_production_case_insensitive() {
        let v = view(vec![
            rec("Ana", "Producción", 10.0),
            rec("Ana", "PRODUCCIÓN extra", 2.5),
            rec("Ana", "Parada", 4.0),
        ]);
        assert_eq!(MetricsCalculator::total_production(&v), 12.5);
    }

    #[test]
    fn test_total_failures_uses_level3_only() {
        let v = view(vec![
            with_level3(rec("Ana", "Parada", 5.0), "FALLA MOTOR"),
            with_level3(rec("Ana", "Parada", 1.0), "falla sensor"),
            rec("Ana", "Falla", 7.0),
            with_level3(rec("Ana", "Parada", 3.0), "Limpieza"),
        ]);
        assert_eq!(MetricsCalculator::total_failures(&v), 6.0);
    }

    #[test]
    fn test_total_count() {
        let v = view(vec![rec("Ana", "SMED", 1.0), rec("Luis", "SMED", 1.0)]);
        assert_eq!(metrics(&v).total_count, 2);
    }

    // ── category averages ─────────────────────────────────────────────────────

    #[test]
    fn test_category_average_mean_of_matches() {
        let v = view(vec![
            rec("Ana", "SMED", 4.0),
            rec("Luis", "SMED cambio molde", 8.0),
            rec("Luis", "Producción", 100.0),
        ]);
        assert_eq!(MetricsCalculator::category_average(&v, "SMED"), 6.0);
    }

    #[test]
    fn test_category_average_zero_without_matches() {
        let v = view(vec![rec("Ana", "Producción", 10.0)]);
        assert_eq!(MetricsCalculator::category_average(&v, "BAÑO"), 0.0);
        assert_eq!(MetricsCalculator::category_average(&v, "LIMPIEZA"), 0.0);
    }

    #[test]
    fn test_category_average_matches_any_field() {
        let mut baño = rec("Ana", "Pausa", 6.0);
        baño.level4 = Some("Baño".into());
        // The operator name alone is enough to count.
        let smed_name = rec("Smedina", "Producción", 30.0);
        let v = view(vec![baño, smed_name, rec("Luis", "SMED", 10.0)]);

        assert_eq!(MetricsCalculator::category_average(&v, "BAÑO"), 6.0);
        assert_eq!(MetricsCalculator::category_average(&v, "SMED"), 20.0);
    }

    #[test]
    fn test_category_average_untagged_pattern_scans_row() {
        let mut r = rec("Ana", "Parada", 9.0);
        r.level5 = Some("Limpieza general".into());
        let v = view(vec![r, rec("Luis", "Parada", 3.0)]);
        assert_eq!(MetricsCalculator::category_average(&v, "limpieza"), 9.0);
    }

    #[test]
    fn test_tag_lookup_agrees_with_row_scan() {
        let v = view(vec![
            rec("Ana", "Refrigerio", 30.0),
            rec("Luis", "Pausa refrigerio", 20.0),
            rec("Eva", "SMED", 5.0),
        ]);
        let mut untagged = v.clone();
        untagged.category_labels.clear();

        for label in ["SMED", "BAÑO", "REFRIGERIO"] {
            assert_eq!(
                MetricsCalculator::category_average(&v, label),
                MetricsCalculator::category_average(&untagged, label)
            );
        }
    }

    #[test]
    fn test_compute_reports_configured_labels_in_order() {
        let v = view(vec![rec("Ana", "Refrigerio", 30.0)]);
        let result = metrics(&v);
        let labels: Vec<&str> = result.category_averages.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["SMED", "BAÑO", "REFRIGERIO"]);
        assert_eq!(result.category_average("REFRIGERIO"), Some(30.0));
    }
}
