use crate::active_cells::ActiveCells;
use candela_core::{classify, BidAskEvent, Candle, Classification, Interval, StoreKey, Symbol};
use candela_metrics::Metrics;
use candela_store::CandleStore;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Folds a stream of `BidAskEvent`s into OHLCV candles across five fixed
/// intervals and persists completed windows to the candle store
/// (component C6).
pub struct Aggregator {
    cells: ActiveCells,
    store: Arc<CandleStore>,
    metrics: Arc<Metrics>,
    tolerance_ms: i64,
    whitelist: Option<HashSet<Symbol>>,
    /// At most one pending candle per key, retried on the next rotation of
    /// that key or at `flush_all`.
    retry_buffer: Mutex<HashMap<StoreKey, Candle>>,
    late_events_dropped: AtomicU64,
}

impl Aggregator {
    pub fn new(
        store: Arc<CandleStore>,
        metrics: Arc<Metrics>,
        tolerance_ms: i64,
        whitelist: Option<Vec<Symbol>>,
    ) -> Self {
        Self {
            cells: ActiveCells::new(),
            store,
            metrics,
            tolerance_ms,
            whitelist: whitelist.map(|v| v.into_iter().collect()),
            retry_buffer: Mutex::new(HashMap::new()),
            late_events_dropped: AtomicU64::new(0),
        }
    }

    fn is_allowed(&self, symbol: Symbol) -> bool {
        match &self.whitelist {
            None => true,
            Some(set) => set.contains(&symbol),
        }
    }

    /// Folds one event into all five interval windows. Never panics on bad
    /// input, never blocks on I/O for longer than one synchronous store
    /// write, and never propagates an error to the caller.
    pub fn process(&self, event: BidAskEvent) {
        let start = Instant::now();

        if !event.is_valid() || !self.is_allowed(event.symbol) {
            self.metrics.record_event_rejected();
            return;
        }

        let price = event.mid();

        for interval in Interval::ALL {
            self.process_interval(event.symbol, interval, event.timestamp_ms, price);
        }

        self.metrics.record_event_processed();
        self.metrics
            .record_latency_ns(start.elapsed().as_nanos() as u64);
    }

    fn process_interval(&self, symbol: Symbol, interval: Interval, ts_ms: i64, price: f64) {
        let ews = interval.align(ts_ms);
        let mut guard = self.cells.lock_shard(symbol, interval);
        let key = (symbol, interval);

        match guard.get_mut(&key) {
            None => {
                guard.insert(key, candela_core::MutableCell::new(symbol, interval, ews, price));
            }
            Some(cell) => {
                match classify(ts_ms, cell.window_start(), interval, self.tolerance_ms) {
                    Classification::Same => cell.update(price),
                    Classification::NewWindow => {
                        // Persist the old window before the new cell
                        // replaces it: hold the shard lock across the
                        // write so no reader can observe the new cell
                        // before the old one lands in the store. Blocks
                        // other keys in the same shard for one write.
                        let frozen = cell.freeze();
                        let store_key = StoreKey::new(symbol, interval, frozen.time_ms);
                        self.persist_with_retry(store_key, frozen);
                        *cell = candela_core::MutableCell::new(symbol, interval, ews, price);
                        drop(guard);
                        self.metrics.record_candle_completed();
                        return;
                    }
                    Classification::LateWithin => {
                        // Read-fold-write against the store for an
                        // already-rotated window, under the same shard
                        // lock a concurrent late event for this key would
                        // need: two late arrivals for one key can't
                        // interleave their store.get/store.put.
                        self.handle_late_within(guard, symbol, interval, ews, price);
                        return;
                    }
                    Classification::LateBeyond => {
                        self.late_events_dropped.fetch_add(1, Ordering::Relaxed);
                        self.metrics.record_late_beyond_tolerance();
                    }
                }
            }
        }
    }

    fn handle_late_within(
        &self,
        guard: parking_lot::MutexGuard<'_, HashMap<(Symbol, Interval), candela_core::MutableCell>>,
        symbol: Symbol,
        interval: Interval,
        ews: i64,
        price: f64,
    ) {
        self.metrics.record_late_within_tolerance();
        let key = StoreKey::new(symbol, interval, ews);
        let base = self.store.get(key).unwrap_or_else(|| Candle::one_shot(ews, price));
        let folded = base.fold_in(price);
        self.persist_with_retry(key, folded);
        drop(guard);
    }

    /// Flushes any previously failed write for `key`, then attempts to
    /// persist `candle`. On failure, the candle replaces whatever was
    /// pending for `key` in the retry buffer: at most one candle is kept
    /// per key, so an already-pending entry that gets overwritten here is
    /// a deliberate, counted data-loss case rather than a bug.
    fn persist_with_retry(&self, key: StoreKey, candle: Candle) {
        self.flush_pending(key);
        if let Err(e) = self.store.put(key, candle) {
            warn!(%key, error = %e, "candle store write failed, buffering for retry");
            self.metrics.record_storage_write_error();
            self.retry_buffer.lock().insert(key, candle);
        }
    }

    fn flush_pending(&self, key: StoreKey) {
        let pending = self.retry_buffer.lock().remove(&key);
        if let Some(candle) = pending {
            if self.store.put(key, candle).is_err() {
                self.retry_buffer.lock().insert(key, candle);
            }
        }
    }

    /// Freezes and persists every active cell, then drains the retry
    /// buffer. Idempotent; safe to call more than once, though callers
    /// are expected to call it exactly once at controlled shutdown.
    pub fn flush_all(&self) {
        let store = &self.store;
        let metrics = &self.metrics;
        self.cells.drain_all(|(symbol, interval), cell| {
            let frozen = cell.freeze();
            let key = StoreKey::new(symbol, interval, frozen.time_ms);
            if store.put(key, frozen).is_err() {
                metrics.record_storage_write_error();
                self.retry_buffer.lock().insert(key, frozen);
            }
        });

        let pending: Vec<(StoreKey, Candle)> = self.retry_buffer.lock().drain().collect();
        for (key, candle) in pending {
            if store.put(key, candle).is_err() {
                debug!(%key, "candle lost on flush_all: store write failed twice");
                metrics.record_storage_write_error();
            }
        }
    }

    pub fn late_events_dropped(&self) -> u64 {
        self.late_events_dropped.load(Ordering::Relaxed)
    }
}
