//! Periodic refresh loop.
//!
//! Runs [`DataManager`] and the analysis pipeline in a tokio task, sending a
//! [`Snapshot`] per refresh through an `mpsc` channel so the caller can render
//! results without any shared mutable state.
//!
//! Fetching may sleep between retries and ingestion is CPU-bound, so each
//! refresh runs on the blocking pool with the manager moved in and out.

use std::sync::Arc;
use std::time::Duration;

use floor_core::models::{Dataset, FilterCriteria};
use floor_data::analysis::{analyze_dataset, PipelineOutcome};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time;

use crate::clock::Clock;
use crate::data_manager::{DataManager, FeedSource};

/// Builds the filter criteria for a freshly loaded dataset.
pub type CriteriaFn = Arc<dyn Fn(&Dataset) -> FilterCriteria + Send + Sync>;

// ── Public types ──────────────────────────────────────────────────────────────

/// Result of one refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// 1 for the initial refresh, incremented on every tick.
    pub sequence: u64,
    /// Pipeline outcome, or `None` when no dataset could be obtained.
    pub outcome: Option<PipelineOutcome>,
    /// Last fetch error, also set when a stale dataset was served.
    pub error: Option<String>,
}

// ── RefreshOrchestrator ───────────────────────────────────────────────────────

/// Background refresh coordinator.
pub struct RefreshOrchestrator {
    /// How often to refresh.
    update_interval: Duration,
    /// Root causes kept in each ranking.
    top_n: usize,
    criteria: CriteriaFn,
}

impl RefreshOrchestrator {
    pub fn new(
        update_interval: Duration,
        top_n: usize,
        criteria: impl Fn(&Dataset) -> FilterCriteria + Send + Sync + 'static,
    ) -> Self {
        Self {
            update_interval,
            top_n,
            criteria: Arc::new(criteria),
        }
    }

    /// Spawn the refresh loop over `manager`.
    ///
    /// Returns the snapshot receiver and a [`RefreshHandle`] that aborts the
    /// loop. The loop also exits once the receiver is dropped.
    pub fn start<S, C>(self, manager: DataManager<S, C>) -> (mpsc::Receiver<Snapshot>, RefreshHandle)
    where
        S: FeedSource + 'static,
        C: Clock + 'static,
    {
        let (tx, rx) = mpsc::channel(16);

        let handle = tokio::spawn(async move {
            self.refresh_loop(manager, tx).await;
        });

        (rx, RefreshHandle { handle })
    }

    // ── Private implementation ────────────────────────────────────────────

    async fn refresh_loop<S, C>(self, manager: DataManager<S, C>, tx: mpsc::Sender<Snapshot>)
    where
        S: FeedSource + 'static,
        C: Clock + 'static,
    {
        let mut sequence = 1;
        let Some(mut manager) = self.refresh_and_send(manager, &tx, sequence, true).await else {
            return;
        };

        let mut interval = time::interval(self.update_interval);
        // The first tick fires immediately and the initial refresh already ran.
        interval.tick().await;

        loop {
            interval.tick().await;

            if tx.is_closed() {
                tracing::debug!("snapshot channel closed; exiting loop");
                break;
            }

            sequence += 1;
            manager = match self.refresh_and_send(manager, &tx, sequence, false).await {
                Some(manager) => manager,
                None => break,
            };
        }
    }

    /// Hands the manager back, or `None` once the receiver is gone.
    async fn refresh_and_send<S, C>(
        &self,
        mut manager: DataManager<S, C>,
        tx: &mpsc::Sender<Snapshot>,
        sequence: u64,
        force: bool,
    ) -> Option<DataManager<S, C>>
    where
        S: FeedSource + 'static,
        C: Clock + 'static,
    {
        let criteria = Arc::clone(&self.criteria);
        let top_n = self.top_n;
        let refresh = tokio::task::spawn_blocking(move || {
            let snapshot = build_snapshot(&mut manager, criteria.as_ref(), top_n, sequence, force);
            (manager, snapshot)
        });

        let (manager, snapshot) = match refresh.await {
            Ok(done) => done,
            Err(e) => {
                tracing::error!(error = %e, "refresh task failed; stopping loop");
                return None;
            }
        };

        if let Err(e) = tx.send(snapshot).await {
            tracing::warn!(error = %e, "failed to send snapshot; receiver dropped");
            return None;
        }
        Some(manager)
    }
}

fn build_snapshot<S: FeedSource, C: Clock>(
    manager: &mut DataManager<S, C>,
    criteria: &(dyn Fn(&Dataset) -> FilterCriteria + Send + Sync),
    top_n: usize,
    sequence: u64,
    force: bool,
) -> Snapshot {
    match manager.get_dataset(force) {
        Ok(dataset) => {
            let criteria = criteria(dataset.as_ref());
            Snapshot {
                sequence,
                outcome: Some(analyze_dataset(&dataset, &criteria, top_n)),
                error: manager.last_error().map(str::to_string),
            }
        }
        Err(e) if e.is_schema_error() => Snapshot {
            sequence,
            outcome: Some(PipelineOutcome::SchemaError {
                message: e.to_string(),
            }),
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "no dataset available for refresh");
            Snapshot {
                sequence,
                outcome: None,
                error: Some(e.to_string()),
            }
        }
    }
}

// ── RefreshHandle ─────────────────────────────────────────────────────────────

/// Handle to the background refresh task.
pub struct RefreshHandle {
    handle: tokio::task::JoinHandle<()>,
}

impl RefreshHandle {
    /// Immediately abort the refresh loop.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
