//! Grouped sums, root-cause rankings and the machine pivot.
//!
//! Two different notions of "failure" coexist here. The root-cause ranking
//! selects records by level 3 (`FALLA`), while the machine pivot selects by
//! event (`Parada|Falla`). They are kept separate on purpose.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use floor_core::classification::{is_failure, is_stoppage_or_failure};
use floor_core::models::{
    AggregationResult, Aggregations, EventRecord, FilteredView, GroupSum, OperatorEvent, Pivot,
};
use tracing::debug;

// ── Aggregator ────────────────────────────────────────────────────────────────

/// Stateless helper that groups filtered records.
pub struct Aggregator;

impl Aggregator {
    /// Sum minutes per key, groups in first-seen order. Records for which
    /// `key_fn` returns `None` are left out.
    pub fn group_sum<K, F>(view: &FilteredView, key_fn: F) -> AggregationResult<K>
    where
        K: Eq + Hash + Clone,
        F: Fn(&EventRecord) -> Option<K>,
    {
        group_records(view.records.iter(), key_fn)
    }

    /// Minutes per event, in first-seen order.
    pub fn breakdown_by_event(view: &FilteredView) -> AggregationResult<String> {
        Self::group_sum(view, |r| Some(r.event.clone()))
    }

    /// Minutes per (operator, event) pair, in first-seen order.
    pub fn breakdown_by_operator_event(view: &FilteredView) -> AggregationResult<OperatorEvent> {
        Self::group_sum(view, |r| {
            Some(OperatorEvent {
                operator: r.operator.clone(),
                event: r.event.clone(),
            })
        })
    }

    /// The `n` root causes with the most level-3 failure minutes.
    ///
    /// Sorted by descending minutes; equal sums keep first-seen order.
    pub fn top_n_root_cause(view: &FilteredView, n: usize) -> AggregationResult<String> {
        let mut groups = group_records(
            view.records.iter().filter(|r| is_failure(r)),
            |r| r.root_cause.clone(),
        );
        // `sort_by` is stable, which gives the tie order.
        groups.sort_by(|a, b| b.minutes.total_cmp(&a.minutes));
        groups.truncate(n);
        groups
    }

    /// Dense Machine × root-cause matrix over stoppage-or-failure events.
    pub fn machine_root_cause_pivot(view: &FilteredView) -> Pivot {
        let cells = group_records(
            view.records.iter().filter(|r| is_stoppage_or_failure(r)),
            |r| {
                r.root_cause
                    .as_ref()
                    .map(|cause| (r.machine.clone(), cause.clone()))
            },
        );

        let machines: Vec<String> = cells
            .iter()
            .map(|g| g.key.0.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let causes: Vec<String> = cells
            .iter()
            .map(|g| g.key.1.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut values = vec![vec![0.0; causes.len()]; machines.len()];
        for cell in &cells {
            let (machine, cause) = &cell.key;
            // Both labels were collected from `cells` above.
            let row = machines.binary_search(machine).unwrap_or_default();
            let col = causes.binary_search(cause).unwrap_or_default();
            values[row][col] = cell.minutes;
        }

        debug!(
            "Pivot built: {} machines x {} root causes",
            machines.len(),
            causes.len()
        );

        Pivot {
            machines,
            causes,
            values,
        }
    }

    /// Every aggregation at once.
    pub fn aggregate(view: &FilteredView, top_n: usize) -> Aggregations {
        Aggregations {
            by_event: Self::breakdown_by_event(view),
            by_operator_event: Self::breakdown_by_operator_event(view),
            top_root_causes: Self::top_n_root_cause(view, top_n),
            machine_root_cause_pivot: Self::machine_root_cause_pivot(view),
        }
    }
}

/// Insertion-ordered grouping driver.
fn group_records<'a, I, K, F>(records: I, key_fn: F) -> AggregationResult<K>
where
    I: Iterator<Item = &'a EventRecord>,
    K: Eq + Hash + Clone,
    F: Fn(&EventRecord) -> Option<K>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: AggregationResult<K> = Vec::new();

    for record in records {
        let Some(key) = key_fn(record) else { continue };
        match index.get(&key) {
            Some(&i) => groups[i].minutes += record.time_minutes,
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(GroupSum {
                    key,
                    minutes: record.time_minutes,
                });
            }
        }
    }

    groups
}

/// Compute every aggregation over `view`.
pub fn aggregate(view: &FilteredView, top_n: usize) -> Aggregations {
    Aggregator::aggregate(view, top_n)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn view(records: Vec<EventRecord>) -> FilteredView {
        FilteredView {
            records,
            category_labels: vec![],
        }
    }

    fn rec(operator: &str, event: &str, machine: &str, minutes: f64) -> EventRecord {
        EventRecord::new(None, operator, event, "F1", machine, minutes)
    }

    fn failure(machine: &str, cause: &str, minutes: f64) -> EventRecord {
        let mut r = rec("Ana", "Parada", machine, minutes);
        r.level3 = Some("FALLA".to_string());
        r.root_cause = Some(cause.to_string());
        r
    }

    fn keys<K: Clone>(groups: &AggregationResult<K>) -> Vec<K> {
        groups.iter().map(|g| g.key.clone()).collect()
    }

    // ── group_sum ─────────────────────────────────────────────────────────────

    #[test]
    fn test_group_sum_insertion_order() {
        let v = view(vec![
            rec("Ana", "Parada", "M1", 1.0),
            rec("Ana", "Producción", "M1", 2.0),
            rec("Ana", "Parada", "M1", 3.0),
        ]);
        let groups = Aggregator::group_sum(&v, |r| Some(r.event.clone()));
        assert_eq!(keys(&groups), vec!["Parada", "Producción"]);
        assert_eq!(groups[0].minutes, 4.0);
        assert_eq!(groups[1].minutes, 2.0);
    }

    #[test]
    fn test_group_sum_skips_missing_keys() {
        let v = view(vec![rec("Ana", "Parada", "M1", 1.0), failure("M1", "Motor", 2.0)]);
        let groups = Aggregator::group_sum(&v, |r| r.root_cause.clone());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].minutes, 2.0);
    }

    #[test]
    fn test_group_sum_empty_view() {
        assert!(Aggregator::breakdown_by_event(&view(vec![])).is_empty());
    }

    // ── breakdowns ────────────────────────────────────────────────────────────

    #[test]
    fn test_breakdown_by_operator_event() {
        let v = view(vec![
            rec("Ana", "SMED", "M1", 1.0),
            rec("Luis", "SMED", "M1", 2.0),
            rec("Ana", "SMED", "M1", 4.0),
        ]);
        let groups = Aggregator::breakdown_by_operator_event(&v);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key.operator, "Ana");
        assert_eq!(groups[0].minutes, 5.0);
        assert_eq!(groups[1].key.operator, "Luis");
        assert_eq!(groups[1].minutes, 2.0);
    }

    // ── top_n_root_cause ──────────────────────────────────────────────────────

    #[test]
    fn test_top_n_descending_and_truncated() {
        let v = view(vec![
            failure("M1", "Correa", 2.0),
            failure("M1", "Motor", 5.0),
            failure("M2", "Sensor", 9.0),
            failure("M2", "Correa", 1.0),
        ]);
        let top = Aggregator::top_n_root_cause(&v, 2);
        assert_eq!(keys(&top), vec!["Sensor", "Motor"]);
        assert_eq!(top[0].minutes, 9.0);
        assert_eq!(top[1].minutes, 5.0);
    }

    #[test]
    fn test_top_n_ties_keep_first_seen_order() {
        let v = view(vec![
            failure("M1", "B", 3.0),
            failure("M1", "A", 3.0),
            failure("M1", "C", 3.0),
        ]);
        assert_eq!(keys(&Aggregator::top_n_root_cause(&v, 3)), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_top_n_fewer_groups_than_n() {
        let v = view(vec![failure("M1", "Motor", 5.0)]);
        assert_eq!(Aggregator::top_n_root_cause(&v, 10).len(), 1);
        assert!(Aggregator::top_n_root_cause(&v, 0).is_empty());
    }

    #[test]
    fn test_top_n_requires_level3_failure() {
        let mut stoppage = rec("Ana", "Falla", "M1", 8.0);
        stoppage.root_cause = Some("Motor".into());
        let mut other_level = failure("M1", "Sensor", 4.0);
        other_level.level3 = Some("Ajuste".into());
        let v = view(vec![stoppage, other_level]);
        assert!(Aggregator::top_n_root_cause(&v, 5).is_empty());
    }

    // ── machine_root_cause_pivot ──────────────────────────────────────────────

    #[test]
    fn test_pivot_dense_and_zero_filled() {
        let v = view(vec![
            failure("M2", "Motor", 5.0),
            failure("M1", "Correa", 2.0),
            failure("M2", "Motor", 1.0),
        ]);
        let pivot = Aggregator::machine_root_cause_pivot(&v);
        assert_eq!(pivot.machines, vec!["M1", "M2"]);
        assert_eq!(pivot.causes, vec!["Correa", "Motor"]);
        assert_eq!(pivot.values, vec![vec![2.0, 0.0], vec![0.0, 6.0]]);
    }

    #[test]
    fn test_pivot_uses_event_predicate() {
        // Level-3 failure on a production event: ranked, but not pivoted.
        let mut production = rec("Ana", "Producción", "M1", 7.0);
        production.level3 = Some("FALLA".into());
        production.root_cause = Some("Motor".into());
        // "Falla" event without a level-3 failure: pivoted, but not ranked.
        let mut falla = rec("Ana", "falla eléctrica", "M3", 4.0);
        falla.root_cause = Some("Cable".into());

        let v = view(vec![production, falla]);
        let pivot = Aggregator::machine_root_cause_pivot(&v);
        assert_eq!(pivot.machines, vec!["M3"]);
        assert_eq!(pivot.get("M3", "Cable"), Some(4.0));
        assert_eq!(keys(&Aggregator::top_n_root_cause(&v, 5)), vec!["Motor"]);
    }

    #[test]
    fn test_pivot_empty_when_no_stoppages() {
        let v = view(vec![rec("Ana", "Producción", "M1", 7.0)]);
        let pivot = Aggregator::machine_root_cause_pivot(&v);
        assert!(pivot.is_empty());
        assert!(pivot.values.is_empty());
    }

    // ── aggregate ─────────────────────────────────────────────────────────────

    #[test]
    fn test_aggregate_bundles_all() {
        let v = view(vec![rec("Ana", "Producción", "M1", 10.0), failure("M1", "Motor", 5.0)]);
        let all = aggregate(&v, 1);
        assert_eq!(all.by_event.len(), 2);
        assert_eq!(all.by_operator_event.len(), 2);
        assert_eq!(keys(&all.top_root_causes), vec!["Motor"]);
        assert_eq!(all.machine_root_cause_pivot.get("M1", "Motor"), Some(5.0));
    }
}
