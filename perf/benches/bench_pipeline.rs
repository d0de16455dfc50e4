use candela_core::{BidAskEvent, Symbol};
use candela_pipeline::EventPipeline;
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

fn sample_event() -> BidAskEvent {
    BidAskEvent::new(Symbol::parse("BTCUSD").unwrap(), 50000.0, 50010.0, 1_700_000_000_000)
}

fn bench_try_publish(c: &mut Criterion) {
    let pipeline = EventPipeline::<BidAskEvent>::new(65536);
    let event = sample_event();

    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Elements(1));

    group.bench_function("try_publish", |b| {
        b.iter(|| {
            pipeline.try_publish(black_box(event));
            black_box(pipeline.try_read());
        });
    });

    group.finish();
}

fn bench_try_read_empty(c: &mut Criterion) {
    let pipeline = EventPipeline::<BidAskEvent>::new(65536);

    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Elements(1));

    group.bench_function("try_read (empty)", |b| {
        b.iter(|| black_box(pipeline.try_read()));
    });

    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let pipeline = EventPipeline::<BidAskEvent>::new(65536);
    let event = sample_event();

    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Elements(1));

    group.bench_function("round_trip", |b| {
        b.iter(|| {
            pipeline.try_publish(black_box(event));
            black_box(pipeline.try_read());
        });
    });

    group.finish();
}

fn bench_throughput_capacities(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_capacity");
    group.throughput(Throughput::Elements(1));

    for &cap in &[1024usize, 4096, 16384, 65536] {
        let pipeline = EventPipeline::<BidAskEvent>::new(cap);
        let event = sample_event();

        group.bench_function(format!("round_trip_cap_{cap}"), |b| {
            b.iter(|| {
                pipeline.try_publish(black_box(event));
                black_box(pipeline.try_read());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_try_publish,
    bench_try_read_empty,
    bench_round_trip,
    bench_throughput_capacities,
);
criterion_main!(benches);
