/// One of the five fixed aggregation windows. Fieldless by design: the set
/// is closed to {S1, S5, M1, M15, H1}, so there is nothing to parametrize
/// at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    S1,
    S5,
    M1,
    M15,
    H1,
}

impl Interval {
    /// Fixed iteration order used by the aggregator's per-event fan-out.
    pub const ALL: [Interval; 5] = [
        Interval::S1,
        Interval::S5,
        Interval::M1,
        Interval::M15,
        Interval::H1,
    ];

    /// Bucket width in milliseconds.
    #[inline(always)]
    pub const fn width_ms(self) -> i64 {
        match self {
            Interval::S1 => 1_000,
            Interval::S5 => 5_000,
            Interval::M1 => 60_000,
            Interval::M15 => 900_000,
            Interval::H1 => 3_600_000,
        }
    }

    /// Wire name used in `StoreKey` and config.
    #[inline(always)]
    pub const fn name(self) -> &'static str {
        match self {
            Interval::S1 => "S1",
            Interval::S5 => "S5",
            Interval::M1 => "M1",
            Interval::M15 => "M15",
            Interval::H1 => "H1",
        }
    }

    /// Floors `ts_ms` to its bucket start: `floor(ts_ms / width) * width`.
    ///
    /// Pure. Callers must ensure `ts_ms >= 0` — negative timestamps are
    /// invalid inputs rejected upstream; this is otherwise integer floor
    /// division, well defined but not meaningful for negatives.
    #[inline(always)]
    pub const fn align(self, ts_ms: i64) -> i64 {
        let width = self.width_ms();
        (ts_ms / width) * width
    }

    /// `window_end(ws) = ws + width`.
    #[inline(always)]
    pub const fn window_end(self, window_start_ms: i64) -> i64 {
        window_start_ms + self.width_ms()
    }
}

/// Result of classifying an event's timestamp against the currently open
/// window for one `(symbol, interval)` series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Event falls in the currently open window.
    Same,
    /// Event opens a window strictly after the current one.
    NewWindow,
    /// Event is late but within `tolerance_ms` of the current window start.
    LateWithin,
    /// Event is late beyond tolerance; must be dropped.
    LateBeyond,
}

/// Classifies `event_ts` against `current_window_start` for `interval`,
/// with an inclusive tolerance boundary: lag exactly equal to
/// `tolerance_ms` is `LateWithin`, not `LateBeyond`.
#[inline]
pub fn classify(
    event_ts: i64,
    current_window_start: i64,
    interval: Interval,
    tolerance_ms: i64,
) -> Classification {
    let ews = interval.align(event_ts);
    if ews == current_window_start {
        Classification::Same
    } else if ews > current_window_start {
        Classification::NewWindow
    } else if current_window_start - event_ts <= tolerance_ms {
        Classification::LateWithin
    } else {
        Classification::LateBeyond
    }
}
