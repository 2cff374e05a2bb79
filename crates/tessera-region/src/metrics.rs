//! Observability metrics for the region controller.
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `tessera_region_requests_total` | Counter | `kind`, `result` | Requests processed |
//! | `tessera_region_slices_purged_total` | Counter | `source` | Slices dropped after reporting not-found-or-dead |
//! | `tessera_region_slices` | Gauge | `site` | Slices currently owned |
//! | `tessera_region_reconcile_seconds` | Histogram | `site` | Reconciliation pass duration |
//!
//! Metrics go through the `metrics` crate facade; installing an exporter is
//! up to the embedding binary.

use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Requests processed by kind and result.
    pub const REQUESTS_TOTAL: &str = "tessera_region_requests_total";
    /// Counter: Slices purged after reporting not-found-or-dead.
    pub const SLICES_PURGED_TOTAL: &str = "tessera_region_slices_purged_total";
    /// Gauge: Slices currently owned.
    pub const SLICES: &str = "tessera_region_slices";
    /// Histogram: Reconciliation pass duration in seconds.
    pub const RECONCILE_SECONDS: &str = "tessera_region_reconcile_seconds";
}

/// Label keys used across metrics.
pub mod labels {
    /// Request kind (compute, storage, stitch).
    pub const KIND: &str = "kind";
    /// Result (ok, bad_request, not_found, slice_gone, error).
    pub const RESULT: &str = "result";
    /// Operation that discovered the dead slice.
    pub const SOURCE: &str = "source";
    /// Region identity.
    pub const SITE: &str = "site";
}

/// Records region controller metrics with consistent labels.
#[derive(Debug, Clone)]
pub struct RegionMetrics {
    site: String,
}

impl RegionMetrics {
    /// Creates a recorder for one region.
    #[must_use]
    pub fn new(site: impl Into<String>) -> Self {
        Self { site: site.into() }
    }

    /// Records the outcome of a request.
    pub fn record_request(&self, kind: &'static str, result: &'static str) {
        counter!(
            names::REQUESTS_TOTAL,
            labels::KIND => kind,
            labels::RESULT => result,
            labels::SITE => self.site.clone(),
        )
        .increment(1);
    }

    /// Records a slice dropped after reporting not-found-or-dead.
    pub fn record_purge(&self, source: &'static str) {
        counter!(
            names::SLICES_PURGED_TOTAL,
            labels::SOURCE => source,
            labels::SITE => self.site.clone(),
        )
        .increment(1);
    }

    /// Sets the number of slices owned.
    #[allow(clippy::cast_precision_loss)] // Slice counts are small
    pub fn set_slices(&self, count: usize) {
        gauge!(names::SLICES, labels::SITE => self.site.clone()).set(count as f64);
    }

    /// Records a reconciliation pass duration.
    pub fn observe_reconcile(&self, duration: Duration) {
        histogram!(names::RECONCILE_SECONDS, labels::SITE => self.site.clone())
            .record(duration.as_secs_f64());
    }
}

/// RAII guard for timing operations.
///
/// Automatically records duration when dropped.
pub struct TimingGuard<F>
where
    F: FnOnce(Duration),
{
    start: Instant,
    on_drop: Option<F>,
}

impl<F> TimingGuard<F>
where
    F: FnOnce(Duration),
{
    /// Creates a new timing guard that will call `on_drop` with the elapsed duration.
    pub fn new(on_drop: F) -> Self {
        Self {
            start: Instant::now(),
            on_drop: Some(on_drop),
        }
    }
}

impl<F> Drop for TimingGuard<F>
where
    F: FnOnce(Duration),
{
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f(self.start.elapsed());
        }
    }
}
