use crate::candle::Candle;
use crate::interval::Interval;
use crate::symbol::Symbol;

/// The aggregator's in-flight working state for one `(symbol, interval)`
/// window. Not observable outside `candela-engine`: it is created on first
/// event, mutated in place while the window is open, and destroyed by
/// [`MutableCell::freeze`] on rotation.
#[derive(Debug, Clone, Copy)]
pub struct MutableCell {
    pub symbol: Symbol,
    pub interval: Interval,
    pub window_start: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
}

impl MutableCell {
    /// Creates a fresh cell from the first event to land in a window.
    #[inline]
    pub fn new(symbol: Symbol, interval: Interval, window_start: i64, price: f64) -> Self {
        Self {
            symbol,
            interval,
            window_start,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 1,
        }
    }

    #[inline(always)]
    pub fn window_start(&self) -> i64 {
        self.window_start
    }

    /// O(1), no allocation: `high := max(high, price)`, `low := min(low,
    /// price)`, `close := price`, `volume += 1`.
    #[inline(always)]
    pub fn update(&mut self, price: f64) {
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.close = price;
        self.volume += 1;
    }

    /// Copies the cell's fields into an immutable [`Candle`]. The only
    /// allocation-free, per-rotation snapshot operation on the rotation path.
    #[inline]
    pub fn freeze(&self) -> Candle {
        Candle::new(
            self.window_start,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        )
    }
}
