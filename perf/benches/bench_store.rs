use candela_core::{Candle, Interval, StoreKey, Symbol};
use candela_store::CandleStore;
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

fn temp_path(label: &str) -> String {
    format!("/tmp/candela_bench_store_{label}_{}", std::process::id())
}

fn sample_key() -> StoreKey {
    StoreKey::new(Symbol::parse("BTCUSD").unwrap(), Interval::S1, 1_700_000_000_000)
}

fn sample_candle() -> Candle {
    Candle::one_shot(1_700_000_000_000, 50000.0)
}

fn bench_put(c: &mut Criterion) {
    let path = temp_path("put");
    let store = CandleStore::create(&path, 1 << 16).expect("failed to create store");
    let candle = sample_candle();

    let mut group = c.benchmark_group("store");
    group.throughput(Throughput::Elements(1));

    let mut i = 0i64;
    group.bench_function("put", |b| {
        b.iter(|| {
            let key = StoreKey::new(Symbol::parse("BTCUSD").unwrap(), Interval::S1, i);
            i += 1000;
            store.put(black_box(key), black_box(candle)).unwrap();
        });
    });

    group.finish();
    let _ = std::fs::remove_file(&path);
}

fn bench_get_hit(c: &mut Criterion) {
    let path = temp_path("get_hit");
    let store = CandleStore::create(&path, 1 << 16).expect("failed to create store");
    let key = sample_key();
    store.put(key, sample_candle()).unwrap();

    let mut group = c.benchmark_group("store");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get (hit)", |b| {
        b.iter(|| black_box(store.get(black_box(key))));
    });

    group.finish();
    let _ = std::fs::remove_file(&path);
}

fn bench_get_miss(c: &mut Criterion) {
    let path = temp_path("get_miss");
    let store = CandleStore::create(&path, 1 << 16).expect("failed to create store");
    let key = sample_key();

    let mut group = c.benchmark_group("store");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get (miss)", |b| {
        b.iter(|| black_box(store.get(black_box(key))));
    });

    group.finish();
    let _ = std::fs::remove_file(&path);
}

fn bench_range_scan(c: &mut Criterion) {
    let path = temp_path("range");
    let store = CandleStore::create(&path, 1 << 16).expect("failed to create store");
    let symbol = Symbol::parse("BTCUSD").unwrap();
    for i in 0..1000i64 {
        let key = StoreKey::new(symbol, Interval::S1, i * 1000);
        store.put(key, Candle::one_shot(i * 1000, 50000.0)).unwrap();
    }

    let mut group = c.benchmark_group("store");
    group.throughput(Throughput::Elements(1000));

    group.bench_function("range (1000 candles)", |b| {
        b.iter(|| black_box(store.range(symbol, Interval::S1, 0, 999_000)));
    });

    group.finish();
    let _ = std::fs::remove_file(&path);
}

criterion_group!(
    benches,
    bench_put,
    bench_get_hit,
    bench_get_miss,
    bench_range_scan,
);
criterion_main!(benches);
