//! `candela-store`: a process-local, memory-mapped, durable keyed store for
//! completed candles (component C5).
//!
//! Keys are `(symbol, interval, window_start_ms)` triples serialized ASCII
//! by [`candela_core::StoreKey`]; values are six-field [`candela_core::Candle`]
//! records. The on-disk layout is a fixed-capacity open-addressing slot
//! table sharded for write concurrency (see [`layout`]).

mod error;
mod layout;
mod store;

pub use error::StoreError;
pub use layout::{N_SHARDS, STORE_MAGIC, STORE_VERSION};
pub use store::{CandleStore, ReadOnlyCandleStore};

#[cfg(test)]
mod tests {
    use super::*;
    use candela_core::{Candle, Interval, StoreKey, Symbol};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn tmp_path(name: &str) -> String {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        format!("/tmp/candela_store_test_{name}_{ts}")
    }

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    #[test]
    fn put_then_get_roundtrips() {
        let path = tmp_path("roundtrip");
        let store = CandleStore::create(&path, 1024).unwrap();
        let key = StoreKey::new(sym("BTCUSD"), Interval::S1, 1_733_529_443_000);
        let candle = Candle::new(1_733_529_443_000, 50000.0, 50100.0, 49900.0, 50050.0, 4);

        store.put(key, candle).unwrap();
        let got = store.get(key).unwrap();
        assert_eq!(got, candle);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn get_missing_key_returns_none() {
        let path = tmp_path("missing");
        let store = CandleStore::create(&path, 1024).unwrap();
        let key = StoreKey::new(sym("ETHUSD"), Interval::M1, 0);
        assert!(store.get(key).is_none());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn put_overwrites_existing_key() {
        let path = tmp_path("overwrite");
        let store = CandleStore::create(&path, 1024).unwrap();
        let key = StoreKey::new(sym("BTCUSD"), Interval::S1, 1000);
        let first = Candle::one_shot(1000, 100.0);
        let second = Candle::one_shot(1000, 200.0);

        store.put(key, first).unwrap();
        store.put(key, second).unwrap();

        assert_eq!(store.get(key).unwrap(), second);
        assert_eq!(store.count(), 1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn range_filters_by_series_and_numeric_bounds() {
        let path = tmp_path("range");
        let store = CandleStore::create(&path, 1024).unwrap();
        let btc = sym("BTCUSD");
        let eth = sym("ETHUSD");

        for i in 0..5i64 {
            let ts = i * 1000;
            store
                .put(
                    StoreKey::new(btc, Interval::S1, ts),
                    Candle::one_shot(ts, 100.0 + i as f64),
                )
                .unwrap();
        }
        store
            .put(
                StoreKey::new(eth, Interval::S1, 2000),
                Candle::one_shot(2000, 9999.0),
            )
            .unwrap();

        let results = store.range(btc, Interval::S1, 1000, 3000);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].time_ms, 1000);
        assert_eq!(results[1].time_ms, 2000);
        assert_eq!(results[2].time_ms, 3000);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn range_with_inverted_bounds_is_empty_not_error() {
        let path = tmp_path("inverted");
        let store = CandleStore::create(&path, 1024).unwrap();
        let btc = sym("BTCUSD");
        store
            .put(StoreKey::new(btc, Interval::S1, 1000), Candle::one_shot(1000, 1.0))
            .unwrap();

        let results = store.range(btc, Interval::S1, 5000, 1000);
        assert!(results.is_empty());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn delete_older_than_tombstones_and_updates_count() {
        let path = tmp_path("delete");
        let store = CandleStore::create(&path, 1024).unwrap();
        let btc = sym("BTCUSD");
        for i in 0..3i64 {
            let ts = i * 1000;
            store
                .put(StoreKey::new(btc, Interval::S1, ts), Candle::one_shot(ts, 1.0))
                .unwrap();
        }
        assert_eq!(store.count(), 3);

        let removed = store.delete_older_than(2000);
        assert_eq!(removed, 2);
        assert_eq!(store.count(), 1);
        assert!(store.get(StoreKey::new(btc, Interval::S1, 0)).is_none());
        assert!(store.get(StoreKey::new(btc, Interval::S1, 2000)).is_some());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn is_healthy_reports_true_on_a_working_store() {
        let path = tmp_path("health");
        let store = CandleStore::create(&path, 1024).unwrap();
        assert!(store.is_healthy());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn is_healthy_does_not_delete_real_candles_at_time_zero() {
        let path = tmp_path("health_preserves_data");
        let store = CandleStore::create(&path, 1024).unwrap();
        let key = StoreKey::new(sym("BTCUSD"), Interval::S1, 0);
        store.put(key, Candle::one_shot(0, 100.0)).unwrap();

        assert!(store.is_healthy());
        assert!(store.get(key).is_some(), "probe cleanup must not tombstone unrelated keys");
        assert_eq!(store.count(), 1);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn durability_across_reopen() {
        let path = tmp_path("durable");
        let btc = sym("BTCUSD");
        let key = StoreKey::new(btc, Interval::H1, 1_733_526_000_000);
        let candle = Candle::new(1_733_526_000_000, 1.0, 2.0, 0.5, 1.5, 10);

        {
            let store = CandleStore::create(&path, 1024).unwrap();
            store.put(key, candle).unwrap();
            store.flush().unwrap();
        }
        {
            let store = CandleStore::open(&path).unwrap();
            assert_eq!(store.get(key).unwrap(), candle);
            assert_eq!(store.count(), 1);
        }

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn read_only_store_sees_writer_committed_data() {
        let path = tmp_path("readonly");
        let btc = sym("BTCUSD");
        let key = StoreKey::new(btc, Interval::S5, 5000);
        let candle = Candle::one_shot(5000, 42.0);

        let writer = CandleStore::create(&path, 1024).unwrap();
        writer.put(key, candle).unwrap();
        writer.flush().unwrap();

        let reader = ReadOnlyCandleStore::open(&path).unwrap();
        assert_eq!(reader.count(), 1);
        let results = reader.range(btc, Interval::S5, 0, 10_000);
        assert_eq!(results, vec![candle]);

        drop(writer);
        let _ = std::fs::remove_file(&path);
    }
}
