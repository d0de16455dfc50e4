//! `candela-metrics`: always-on counters and latency percentiles for the
//! aggregation engine, plus an optional feature-gated stage timer for
//! deeper hot-path investigation.

mod stage;

pub use stage::{Stage, StageRecorder};

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters and a latency histogram for the engine.
///
/// Counters are plain `AtomicU64`s, not an external metrics framework,
/// matching how the rest of this workspace tracks throughput (see
/// `RingHeader`/`StoreHeader`'s own atomic fields). The histogram needs
/// more than a single number, so it lives behind a `parking_lot::Mutex`
/// instead.
pub struct Metrics {
    events_processed: AtomicU64,
    events_rejected: AtomicU64,
    candles_completed: AtomicU64,
    late_within_tolerance: AtomicU64,
    late_beyond_tolerance: AtomicU64,
    storage_write_errors: AtomicU64,
    pipeline_dropped: AtomicU64,
    consumer_panics: AtomicU64,
    latency_ns: Mutex<Histogram<u64>>,
}

/// Point-in-time snapshot of [`Metrics`], safe to log or serialize.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub events_processed: u64,
    pub events_rejected: u64,
    pub candles_completed: u64,
    pub late_within_tolerance: u64,
    pub late_beyond_tolerance: u64,
    pub storage_write_errors: u64,
    pub pipeline_dropped: u64,
    pub consumer_panics: u64,
    pub latency: LatencySnapshot,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LatencySnapshot {
    pub p50_ns: u64,
    pub p95_ns: u64,
    pub p99_ns: u64,
    pub p999_ns: u64,
    pub max_ns: u64,
    pub count: u64,
}

impl Metrics {
    /// `highest_trackable_ns` should comfortably exceed any plausible
    /// single-event processing latency (one second is generous headroom).
    pub fn new() -> Self {
        let histogram = Histogram::new_with_bounds(1, 1_000_000_000, 3)
            .expect("histogram bounds are valid for hdrhistogram");
        Self {
            events_processed: AtomicU64::new(0),
            events_rejected: AtomicU64::new(0),
            candles_completed: AtomicU64::new(0),
            late_within_tolerance: AtomicU64::new(0),
            late_beyond_tolerance: AtomicU64::new(0),
            storage_write_errors: AtomicU64::new(0),
            pipeline_dropped: AtomicU64::new(0),
            consumer_panics: AtomicU64::new(0),
            latency_ns: Mutex::new(histogram),
        }
    }

    #[inline]
    pub fn record_event_processed(&self) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_event_rejected(&self) {
        self.events_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_candle_completed(&self) {
        self.candles_completed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_late_within_tolerance(&self) {
        self.late_within_tolerance.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_late_beyond_tolerance(&self) {
        self.late_beyond_tolerance.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_storage_write_error(&self) {
        self.storage_write_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_pipeline_dropped(&self, n: u64) {
        self.pipeline_dropped.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_consumer_panic(&self) {
        self.consumer_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one event's end-to-end processing latency in nanoseconds.
    /// Values above the histogram's highest trackable value are clamped
    /// rather than dropped, so a single pathological sample never loses
    /// the whole recording.
    pub fn record_latency_ns(&self, ns: u64) {
        let mut h = self.latency_ns.lock();
        let clamped = ns.min(h.high());
        let _ = h.record(clamped);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let h = self.latency_ns.lock();
        let latency = if h.len() == 0 {
            LatencySnapshot::default()
        } else {
            LatencySnapshot {
                p50_ns: h.value_at_quantile(0.50),
                p95_ns: h.value_at_quantile(0.95),
                p99_ns: h.value_at_quantile(0.99),
                p999_ns: h.value_at_quantile(0.999),
                max_ns: h.max(),
                count: h.len(),
            }
        };
        MetricsSnapshot {
            events_processed: self.events_processed.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            candles_completed: self.candles_completed.load(Ordering::Relaxed),
            late_within_tolerance: self.late_within_tolerance.load(Ordering::Relaxed),
            late_beyond_tolerance: self.late_beyond_tolerance.load(Ordering::Relaxed),
            storage_write_errors: self.storage_write_errors.load(Ordering::Relaxed),
            pipeline_dropped: self.pipeline_dropped.load(Ordering::Relaxed),
            consumer_panics: self.consumer_panics.load(Ordering::Relaxed),
            latency,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let m = Metrics::new();
        m.record_event_processed();
        m.record_event_processed();
        m.record_candle_completed();
        let snap = m.snapshot();
        assert_eq!(snap.events_processed, 2);
        assert_eq!(snap.candles_completed, 1);
    }

    #[test]
    fn latency_snapshot_is_empty_before_any_sample() {
        let m = Metrics::new();
        let snap = m.snapshot();
        assert_eq!(snap.latency.count, 0);
        assert_eq!(snap.latency.max_ns, 0);
    }

    #[test]
    fn latency_percentiles_reflect_recorded_samples() {
        let m = Metrics::new();
        for ns in [100u64, 200, 300, 400, 500] {
            m.record_latency_ns(ns);
        }
        let snap = m.snapshot();
        assert_eq!(snap.latency.count, 5);
        assert_eq!(snap.latency.max_ns, 500);
        assert!(snap.latency.p50_ns > 0);
    }

    #[test]
    fn out_of_range_latency_is_clamped_not_lost() {
        let m = Metrics::new();
        m.record_latency_ns(u64::MAX);
        let snap = m.snapshot();
        assert_eq!(snap.latency.count, 1);
    }
}
