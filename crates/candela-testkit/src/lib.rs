//! `candela-testkit`: a synthetic `BidAskEvent` generator used by tests and
//! the demo binary to drive the engine without a real market-data feed.

use candela_core::{BidAskEvent, Symbol};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generates a deterministic, reproducible stream of valid `BidAskEvent`s
/// for one or more symbols with monotonically increasing timestamps.
pub struct SyntheticFeed {
    rng: StdRng,
    symbols: Vec<Symbol>,
    ts_ms: i64,
    step_ms: i64,
    base_price: f64,
}

impl SyntheticFeed {
    pub fn new(seed: u64, symbols: Vec<Symbol>, start_ts_ms: i64, step_ms: i64) -> Self {
        assert!(!symbols.is_empty(), "synthetic feed needs at least one symbol");
        assert!(step_ms > 0, "step_ms must be positive to keep timestamps monotonic");
        Self {
            rng: StdRng::seed_from_u64(seed),
            symbols,
            ts_ms: start_ts_ms,
            step_ms,
            base_price: 50_000.0,
        }
    }

    /// Produces the next event: picks a symbol, perturbs the running base
    /// price by a small random walk, and advances the clock by `step_ms`.
    pub fn next_event(&mut self) -> BidAskEvent {
        let symbol = self.symbols[self.rng.gen_range(0..self.symbols.len())];
        let drift: f64 = self.rng.gen_range(-5.0..5.0);
        self.base_price = (self.base_price + drift).max(1.0);
        let spread = self.rng.gen_range(0.5..5.0);
        let bid = self.base_price;
        let ask = self.base_price + spread;
        let ts = self.ts_ms;
        self.ts_ms += self.step_ms;
        BidAskEvent::new(symbol, bid, ask, ts)
    }

    /// Occasionally produces a late event: one whose timestamp lags behind
    /// the clock already advanced past it, for exercising the late-event
    /// path in integration tests. `lag_ms` may push the event beyond any
    /// tolerance the caller has configured; that's the caller's call.
    pub fn next_late_event(&mut self, lag_ms: i64) -> BidAskEvent {
        let symbol = self.symbols[self.rng.gen_range(0..self.symbols.len())];
        let price = self.base_price;
        let late_ts = (self.ts_ms - lag_ms).max(1);
        BidAskEvent::new(symbol, price, price + 1.0, late_ts)
    }

    pub fn take(&mut self, n: usize) -> Vec<BidAskEvent> {
        (0..n).map(|_| self.next_event()).collect()
    }
}
