/// An immutable OHLCV summary of one time bucket.
///
/// Invariants (enforced at construction):
/// - `low <= open <= high`
/// - `low <= close <= high`
/// - `volume >= 1`
///
/// `time_ms` must already be epoch-aligned by the caller; this type has no
/// way to know which `Interval` produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub time_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Constructing a `Candle` from untrusted bytes (e.g. a store read) can fail
/// where the hot-path constructor only needs a `debug_assert!`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleError {
    LowAboveOpenOrHigh,
    LowAboveCloseOrHigh,
    NonPositiveVolume,
}

impl Candle {
    /// Hot-path constructor: invariants are checked with `debug_assert!`
    /// only, since all call sites in this crate derive O/H/L/C from the
    /// same running min/max/first/last bookkeeping and cannot violate them.
    #[inline]
    pub fn new(time_ms: i64, open: f64, high: f64, low: f64, close: f64, volume: i64) -> Self {
        debug_assert!(low <= open && open <= high);
        debug_assert!(low <= close && close <= high);
        debug_assert!(volume >= 1);
        Self {
            time_ms,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Checked constructor used at trust boundaries (deserializing a
    /// candle read back from the store).
    pub fn try_new(
        time_ms: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: i64,
    ) -> Result<Self, CandleError> {
        if !(low <= open && open <= high) {
            return Err(CandleError::LowAboveOpenOrHigh);
        }
        if !(low <= close && close <= high) {
            return Err(CandleError::LowAboveCloseOrHigh);
        }
        if volume < 1 {
            return Err(CandleError::NonPositiveVolume);
        }
        Ok(Self {
            time_ms,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// Folds one more late-arriving price into an already-persisted candle.
    /// `open` is unchanged; `high`/`low` widen; `close` becomes `price`;
    /// `volume` increments. Used only for late-but-within-tolerance updates.
    /// The original is discarded; callers overwrite the store entry in
    /// place, making repeated folds of the same logical event idempotent by
    /// key (not by value - folding the same price twice does change the
    /// record, which is expected: each fold represents a distinct event).
    #[inline]
    pub fn fold_in(&self, price: f64) -> Candle {
        Candle::new(
            self.time_ms,
            self.open,
            self.high.max(price),
            self.low.min(price),
            price,
            self.volume + 1,
        )
    }

    /// Single-event candle, used when a `LateWithin` update targets a
    /// window that was never persisted (e.g. the rotation that would have
    /// created it was lost).
    #[inline]
    pub fn one_shot(time_ms: i64, price: f64) -> Candle {
        Candle::new(time_ms, price, price, price, price, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_in_widens_high_low_and_updates_close() {
        let c = Candle::new(0, 100.0, 105.0, 95.0, 101.0, 4);
        let folded = c.fold_in(99.0);
        assert_eq!(folded.open, 100.0);
        assert_eq!(folded.high, 105.0);
        assert_eq!(folded.low, 95.0);
        assert_eq!(folded.close, 99.0);
        assert_eq!(folded.volume, 5);
    }

    #[test]
    fn fold_in_extends_range_when_price_outside() {
        let c = Candle::new(0, 100.0, 100.0, 100.0, 100.0, 1);
        let folded = c.fold_in(110.0);
        assert_eq!(folded.high, 110.0);
        assert_eq!(folded.low, 100.0);
    }

    #[test]
    fn try_new_rejects_low_above_open() {
        assert_eq!(
            Candle::try_new(0, 5.0, 10.0, 6.0, 8.0, 1).unwrap_err(),
            CandleError::LowAboveOpenOrHigh
        );
    }

    #[test]
    fn try_new_rejects_zero_volume() {
        assert_eq!(
            Candle::try_new(0, 5.0, 10.0, 5.0, 8.0, 0).unwrap_err(),
            CandleError::NonPositiveVolume
        );
    }

    #[test]
    fn one_shot_is_flat_ohlc() {
        let c = Candle::one_shot(0, 42.0);
        assert_eq!((c.open, c.high, c.low, c.close, c.volume), (42.0, 42.0, 42.0, 42.0, 1));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn try_new_accepts_well_ordered_ohlc(low in -1e6f64..1e6, spread in 0f64..1e6, open_frac in 0f64..1f64, close_frac in 0f64..1f64, volume in 1i64..1_000_000) {
            let high = low + spread;
            let open = low + open_frac * spread;
            let close = low + close_frac * spread;
            let c = Candle::try_new(0, open, high, low, close, volume).unwrap();
            prop_assert!(c.low <= c.open && c.open <= c.high);
            prop_assert!(c.low <= c.close && c.close <= c.high);
            prop_assert!(c.volume >= 1);
        }

        #[test]
        fn fold_in_never_narrows_the_range(base in -1e6f64..1e6, spread in 0f64..1e6, price in -2e6f64..2e6) {
            let high = base + spread;
            let c = Candle::new(0, base, high, base, base, 1);
            let folded = c.fold_in(price);
            prop_assert!(folded.high >= c.high);
            prop_assert!(folded.low <= c.low);
            prop_assert_eq!(folded.close, price);
            prop_assert_eq!(folded.volume, c.volume + 1);
        }
    }
}
