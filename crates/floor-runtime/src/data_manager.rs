//! TTL-cached access to the ingested dataset.
//!
//! Wraps a [`FeedSource`] and the [`Ingester`] with a configurable
//! time-to-live cache. Callers use [`DataManager::get_dataset`] to obtain a
//! fresh-or-cached [`Dataset`]; the manager handles staleness checks, up to
//! three fetch attempts with linear back-off, and fallback to the previous
//! dataset when the feed is temporarily unavailable. Freshness is measured
//! with an injected [`Clock`] so tests never depend on wall-clock time.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use floor_core::models::{Dataset, RawTable};
use floor_core::{FloorError, Result};
use floor_data::ingest::Ingester;
use floor_data::reader::load_raw_table;

use crate::clock::{Clock, SystemClock};

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Default freshness window of the raw feed, in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Maximum number of fetch attempts before giving up.
const MAX_RETRY_ATTEMPTS: u32 = 3;

// ── FeedSource ────────────────────────────────────────────────────────────────

/// Anything that can deliver the raw event sheet.
pub trait FeedSource: Send {
    fn fetch(&self) -> Result<RawTable>;
}

/// Reads the feed from a JSON export on disk.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FeedSource for JsonFileSource {
    fn fetch(&self) -> Result<RawTable> {
        load_raw_table(&self.path)
    }
}

// ── DataManager ───────────────────────────────────────────────────────────────

/// TTL-cached wrapper around fetch + ingest.
///
/// # Example
/// ```no_run
/// use floor_runtime::data_manager::{DataManager, JsonFileSource};
///
/// let mut mgr = DataManager::new(JsonFileSource::new("feed.json"), 300);
/// if let Ok(dataset) = mgr.get_dataset(false) {
///     println!("records: {}", dataset.len());
/// }
/// ```
pub struct DataManager<S, C = SystemClock> {
    source: S,
    clock: C,
    ingester: Ingester,
    /// Maximum age of the cached dataset before it is considered stale.
    cache_ttl: Duration,
    /// Most recently ingested dataset.
    cache: Option<Arc<Dataset>>,
    /// When the cache was last populated.
    cache_timestamp: Option<Instant>,
    /// Human-readable description of the last error encountered.
    last_error: Option<String>,
}

impl<S: FeedSource> DataManager<S> {
    /// Manager on the system clock with default ingestion options.
    pub fn new(source: S, cache_ttl_secs: u64) -> Self {
        Self::with_clock(source, cache_ttl_secs, SystemClock, Ingester::default())
    }
}

impl<S: FeedSource, C: Clock> DataManager<S, C> {
    pub fn with_clock(source: S, cache_ttl_secs: u64, clock: C, ingester: Ingester) -> Self {
        Self {
            source,
            clock,
            ingester,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            cache: None,
            cache_timestamp: None,
            last_error: None,
        }
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Return the dataset, using the cache while it is within its TTL.
    ///
    /// With `force_refresh` the cache is bypassed. When the feed cannot be
    /// fetched the previous dataset is returned if there is one. A schema
    /// error in a freshly fetched feed is returned as-is and leaves the cache
    /// untouched.
    pub fn get_dataset(&mut self, force_refresh: bool) -> Result<Arc<Dataset>> {
        if !force_refresh && self.is_cache_valid() {
            if let Some(cached) = &self.cache {
                tracing::debug!("returning cached dataset");
                return Ok(Arc::clone(cached));
            }
        }

        let table = match self.fetch_with_retry() {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!(error = %e, "fetch failed; falling back to cached dataset");
                self.last_error = Some(e.to_string());
                return match &self.cache {
                    Some(stale) => Ok(Arc::clone(stale)),
                    None => Err(e),
                };
            }
        };

        match self.ingester.ingest(&table) {
            Ok(dataset) => {
                tracing::debug!(records = dataset.len(), "dataset cache updated");
                let dataset = Arc::new(dataset);
                self.cache = Some(Arc::clone(&dataset));
                self.cache_timestamp = Some(self.clock.now());
                self.last_error = None;
                Ok(dataset)
            }
            Err(e) => {
                tracing::warn!(error = %e, "fetched feed failed schema validation");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Discard the current cache, forcing the next call to fetch.
    pub fn invalidate_cache(&mut self) {
        self.cache = None;
        self.cache_timestamp = None;
        tracing::debug!("cache invalidated");
    }

    /// Fetch now regardless of freshness.
    pub fn refresh(&mut self) -> Result<Arc<Dataset>> {
        self.get_dataset(true)
    }

    /// Age of the current cache entry, or `None` if nothing was fetched.
    pub fn cache_age(&self) -> Option<Duration> {
        self.cache_timestamp
            .map(|ts| self.clock.now().saturating_duration_since(ts))
    }

    /// Human-readable description of the last error, or `None`.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn is_cache_valid(&self) -> bool {
        match (self.cache.as_ref(), self.cache_age()) {
            (Some(_), Some(age)) => age < self.cache_ttl,
            _ => false,
        }
    }

    /// Up to [`MAX_RETRY_ATTEMPTS`] fetches, waiting 0, 100 and 200 ms.
    ///
    /// Schema errors are returned at once; retrying cannot fix them.
    fn fetch_with_retry(&self) -> Result<RawTable> {
        let mut last_err = FloorError::FeedUnavailable("no fetch attempted".to_string());

        for attempt in 0..MAX_RETRY_ATTEMPTS {
            if attempt > 0 {
                let sleep_ms = u64::from(attempt) * 100;
                tracing::debug!(attempt, sleep_ms, "retrying fetch after back-off");
                self.clock.sleep(Duration::from_millis(sleep_ms));
            }

            match self.source.fetch() {
                Ok(table) => return Ok(table),
                Err(e) if e.is_schema_error() => return Err(e),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "fetch attempt failed");
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
