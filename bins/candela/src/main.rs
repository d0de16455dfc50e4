use candela_config::CandelaConfig;
use candela_core::{BidAskEvent, Symbol};
use candela_engine::Aggregator;
use candela_metrics::Metrics;
use candela_pipeline::{EventPipeline, WaitStrategy};
use candela_store::CandleStore;
use candela_testkit::SyntheticFeed;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./config/candela.toml".to_string());
    let run_seconds: Option<u64> = std::env::args().nth(2).and_then(|s| s.parse().ok());

    let config = CandelaConfig::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let store = Arc::new(if Path::new(&config.store.path).exists() {
        CandleStore::open(&config.store.path)?
    } else {
        CandleStore::create(&config.store.path, config.store.max_entries)?
    });

    let metrics = Arc::new(Metrics::new());

    let whitelist: Vec<Symbol> = config
        .symbols
        .allowed
        .iter()
        .map(|s| Symbol::parse(s))
        .collect::<Result<_, _>>()?;
    let whitelist = if whitelist.is_empty() { None } else { Some(whitelist) };

    let aggregator = Arc::new(Aggregator::new(
        Arc::clone(&store),
        Arc::clone(&metrics),
        config.late_event.tolerance_ms,
        whitelist,
    ));

    let pipeline = EventPipeline::<BidAskEvent>::new(config.pipeline.buffer_size);
    let wait = to_wait_strategy(config.pipeline.wait_strategy_kind()?);

    info!(
        "CANDELA: aggregating into {path} (buffer={buffer}, consumers={consumers}, \
         tolerance_ms={tol}, avg_key_size={aks}, avg_value_size={avs})",
        path = &config.store.path,
        buffer = config.pipeline.buffer_size,
        consumers = config.pipeline.consumers,
        tol = config.late_event.tolerance_ms,
        aks = config.store.avg_key_size,
        avs = config.store.avg_value_size,
    );

    let consumer_agg = Arc::clone(&aggregator);
    let panic_metrics = Arc::clone(&metrics);
    let handle = pipeline.start(
        config.pipeline.consumers,
        wait,
        move |event| {
            consumer_agg.process(event);
        },
        Some(Arc::new(move || panic_metrics.record_consumer_panic())),
    );

    let running = Arc::new(AtomicBool::new(true));
    let producer_pipeline = Arc::clone(&pipeline);
    let producer_metrics = Arc::clone(&metrics);
    let producer_running = Arc::clone(&running);
    let producer_symbols = config
        .symbols
        .allowed
        .iter()
        .map(|s| Symbol::parse(s))
        .collect::<Result<Vec<_>, _>>()?;
    let producer_symbols = if producer_symbols.is_empty() {
        vec![Symbol::parse("BTCUSD").unwrap()]
    } else {
        producer_symbols
    };

    let producer = std::thread::Builder::new()
        .name("candela-synthetic-feed".into())
        .spawn(move || {
            let start_ts_ms = 1_700_000_000_000i64;
            let mut feed = SyntheticFeed::new(0xC0FFEE, producer_symbols, start_ts_ms, 10);
            while producer_running.load(Ordering::Relaxed) {
                let event = feed.next_event();
                if !producer_pipeline.try_publish_or_drop(event) {
                    producer_metrics.record_pipeline_dropped(1);
                }
            }
        })
        .expect("failed to spawn synthetic feed thread");

    let mut last = Instant::now();
    let deadline = run_seconds.map(|s| Instant::now() + Duration::from_secs(s));

    loop {
        if let Some(d) = deadline {
            if Instant::now() >= d {
                break;
            }
        }

        std::thread::sleep(Duration::from_millis(200));

        if last.elapsed() >= Duration::from_secs(1) {
            let snap = metrics.snapshot();
            eprintln!(
                "CANDELA: processed={} rejected={} candles={} late_within={} late_beyond={} \
                 storage_errors={} pipeline_dropped={} p99_us={}",
                snap.events_processed,
                snap.events_rejected,
                snap.candles_completed,
                snap.late_within_tolerance,
                snap.late_beyond_tolerance,
                snap.storage_write_errors,
                snap.pipeline_dropped,
                snap.latency.p99_ns / 1000,
            );
            last = Instant::now();
        }
    }

    running.store(false, Ordering::Relaxed);
    let _ = producer.join();
    pipeline.shutdown(handle);
    aggregator.flush_all();
    store.flush()?;

    Ok(())
}

fn to_wait_strategy(kind: candela_config::WaitStrategyKind) -> WaitStrategy {
    match kind {
        candela_config::WaitStrategyKind::Spin => WaitStrategy::Spin,
        candela_config::WaitStrategyKind::Yield => WaitStrategy::Yield,
        candela_config::WaitStrategyKind::SleepMs(ms) => WaitStrategy::Sleep(Duration::from_millis(ms)),
        candela_config::WaitStrategyKind::Block => WaitStrategy::Block,
    }
}
