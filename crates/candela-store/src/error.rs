/// Failure modes for the candle store.
///
/// `get`/`range` never propagate these to callers — they log, bump
/// `storage_write_errors`/a read-error counter (owned by the aggregator,
/// not this crate), and return empty results instead.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O failure")]
    Io(#[from] std::io::Error),

    #[error("store file is corrupt: {0}")]
    Corrupt(String),

    #[error("store is full (capacity exhausted, no growth-on-demand)")]
    TableFull,
}
