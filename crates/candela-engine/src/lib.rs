//! `candela-engine`: the aggregator core (component C6) that folds
//! `BidAskEvent`s into five-interval OHLCV candles and persists completed
//! windows to `candela-store`.

mod active_cells;
mod aggregator;

pub use aggregator::Aggregator;
