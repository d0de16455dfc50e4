use crate::interval::Interval;
use crate::symbol::Symbol;
use std::fmt;

/// Maximum length of a serialized [`StoreKey`]: `SYMBOL(16) + '-' + INTERVAL(3)
/// + '-' + TIMESTAMP_MS(up to 19 digits for i64::MAX)`.
pub const MAX_KEY_LEN: usize = 16 + 1 + 3 + 1 + 19;

/// A composite key uniquely identifying a persisted candle:
/// `(symbol, interval, window_start_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub symbol: Symbol,
    pub interval: Interval,
    pub window_start_ms: i64,
}

impl StoreKey {
    pub fn new(symbol: Symbol, interval: Interval, window_start_ms: i64) -> Self {
        Self {
            symbol,
            interval,
            window_start_ms,
        }
    }

    /// Writes the ASCII serialized form `"<SYMBOL>-<INTERVAL>-<TIMESTAMP_MS>"`
    /// into `buf`, returning the number of bytes written. `buf` must be at
    /// least [`MAX_KEY_LEN`] bytes.
    pub fn write_ascii(&self, buf: &mut [u8]) -> usize {
        use std::io::Write;
        let mut cursor = &mut buf[..];
        let mut written = 0;
        written += cursor.write(self.symbol.as_str().as_bytes()).unwrap();
        written += cursor.write(b"-").unwrap();
        written += cursor.write(self.interval.name().as_bytes()).unwrap();
        written += cursor.write(b"-").unwrap();
        let mut num_buf = itoa_buf();
        let num_str = write_i64(self.window_start_ms, &mut num_buf);
        written += cursor.write(num_str.as_bytes()).unwrap();
        written
    }

    /// The `"<SYMBOL>-<INTERVAL>-"` prefix shared by every candle in this
    /// series, written into `buf`. Returns the number of bytes written.
    pub fn write_series_prefix(symbol: Symbol, interval: Interval, buf: &mut [u8]) -> usize {
        use std::io::Write;
        let mut cursor = &mut buf[..];
        let mut written = 0;
        written += cursor.write(symbol.as_str().as_bytes()).unwrap();
        written += cursor.write(b"-").unwrap();
        written += cursor.write(interval.name().as_bytes()).unwrap();
        written += cursor.write(b"-").unwrap();
        written
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.symbol,
            self.interval.name(),
            self.window_start_ms
        )
    }
}

/// A stack buffer large enough for any `i64` decimal representation
/// (including the leading `-`).
fn itoa_buf() -> [u8; 20] {
    [0u8; 20]
}

/// Formats `n` as decimal ASCII into `buf`, returning the written slice as
/// `&str`. Avoids a heap-allocating `to_string()` on the hot rotation path.
fn write_i64(n: i64, buf: &mut [u8; 20]) -> &str {
    use std::io::Write;
    let mut cursor = &mut buf[..];
    write!(cursor, "{n}").unwrap();
    let remaining = cursor.len();
    let written = buf.len() - remaining;
    std::str::from_utf8(&buf[..written]).unwrap()
}
