use crate::ring::{seq_to_index, RingConfig};
use crate::seqlock::SeqlockSlot;
use crate::wait_strategy::{Signal, WaitStrategy};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::error;

/// Upper bound on the number of consumer threads [`EventPipeline::start`]
/// will spawn. Four partitions is enough headroom for this workload; a
/// higher count would shrink each partition's batch of work below the cost
/// of the extra thread.
pub const MAX_CONSUMERS: usize = 4;

/// A bounded, in-process, many-producer multi-consumer event queue.
///
/// Adapted from the broadcast ring ([`crate::ring`], [`crate::seqlock`]):
/// producers claim a unique sequence number with `write_seq.fetch_add` and
/// write through the seqlock protocol, exactly as before. The difference is
/// that here the consumer side is a fixed, known set of partitions (at most
/// [`MAX_CONSUMERS`]) rather than an unbounded set of broadcast readers, so
/// their cursors can live in shared state (`read_seqs`) instead of being
/// private to each reader. That turns the ring from an overwrite-on-overrun
/// broadcast channel into a backpressured queue: `try_publish` refuses to
/// claim a slot the slowest consumer hasn't read yet, so `remaining_capacity`
/// is always exact and no event is ever silently overwritten.
pub struct EventPipeline<T: Copy> {
    slots: *mut SeqlockSlot<T>,
    mask: u64,
    capacity: u64,
    write_seq: AtomicU64,
    read_seqs: [AtomicU64; MAX_CONSUMERS],
    active_consumers: AtomicU64,
    dropped: AtomicU64,
    consumer_panics: AtomicU64,
    running: AtomicBool,
    signal: Signal,
    _storage: Box<[SeqlockSlot<T>]>,
}

// SAFETY: every producer claims a distinct sequence number via
// `fetch_add`/`compare_exchange`, and `seq_to_index` maps distinct
// sequence numbers within one capacity-sized window to distinct slots.
// Each consumer partition only ever claims sequence numbers congruent to
// its own thread index modulo the active consumer count, so no two
// producers, and no two consumers, ever access the same slot through `&mut`
// concurrently. The seqlock's own Acquire/Release pair guards the data
// write/read itself.
unsafe impl<T: Copy> Send for EventPipeline<T> {}
unsafe impl<T: Copy> Sync for EventPipeline<T> {}

impl<T: Copy> EventPipeline<T> {
    /// Builds a new pipeline with `capacity` slots (must be a power of two).
    pub fn new(capacity: usize) -> Arc<Self> {
        let cfg = RingConfig::new(capacity);
        // SAFETY: SeqlockSlot's fields are an AtomicU64 (zero is a valid
        // sequence number) and a MaybeUninit<T> (any bit pattern is valid
        // for an uninitialized value). `init()` below sets the real
        // starting sequence; the data field stays logically uninitialized
        // until the first `write()`.
        let mut storage: Box<[SeqlockSlot<T>]> = (0..capacity)
            .map(|_| unsafe { std::mem::zeroed::<SeqlockSlot<T>>() })
            .collect();
        for slot in storage.iter_mut() {
            slot.init();
        }
        let slots = storage.as_mut_ptr();

        Arc::new(Self {
            slots,
            mask: cfg.mask(),
            capacity: capacity as u64,
            write_seq: AtomicU64::new(0),
            read_seqs: std::array::from_fn(|_| AtomicU64::new(0)),
            active_consumers: AtomicU64::new(1),
            dropped: AtomicU64::new(0),
            consumer_panics: AtomicU64::new(0),
            running: AtomicBool::new(true),
            signal: Signal::new(),
            _storage: storage,
        })
    }

    #[inline]
    fn slot(&self, idx: u64) -> &SeqlockSlot<T> {
        unsafe { &*self.slots.add(idx as usize) }
    }

    #[inline]
    fn slot_mut(&self, idx: u64) -> &mut SeqlockSlot<T> {
        unsafe { &mut *self.slots.add(idx as usize) }
    }

    /// Sequence number through which every active partition has read. A
    /// slot holding a sequence number below this point is free for
    /// producers to reuse.
    #[inline]
    fn consumed_through(&self) -> u64 {
        let active = self.active_consumers.load(Ordering::Relaxed) as usize;
        self.read_seqs[..active]
            .iter()
            .map(|r| r.load(Ordering::Acquire))
            .min()
            .unwrap_or(0)
    }

    /// Attempts to publish `value` without blocking. Returns `false` if the
    /// queue is full (the slowest consumer has not yet caught up).
    pub fn try_publish(&self, value: T) -> bool {
        loop {
            let w = self.write_seq.load(Ordering::Relaxed);
            let r = self.consumed_through();
            if w.wrapping_sub(r) >= self.capacity {
                return false;
            }
            if self
                .write_seq
                .compare_exchange_weak(w, w + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                let idx = seq_to_index(w, self.mask);
                self.slot_mut(idx).write(value);
                self.signal.notify_all();
                return true;
            }
        }
    }

    /// Publishes `value`, backing off according to `wait` until there is
    /// room. Never drops an event.
    pub fn publish(&self, value: T, wait: WaitStrategy) {
        while !self.try_publish(value) {
            wait.idle(&self.signal);
        }
    }

    /// Like [`Self::try_publish`] but counts a rejection in
    /// [`Self::dropped_count`] instead of forcing the caller to handle it.
    /// Used by producers that would rather drop a stale event than stall.
    pub fn try_publish_or_drop(&self, value: T) -> bool {
        let ok = self.try_publish(value);
        if !ok {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        ok
    }

    /// Reads the next item belonging to partition `consumer_index` of
    /// `consumers` total partitions: consumer `i` only ever consumes
    /// sequence numbers where `seq % consumers == i`, in order.
    fn try_read_partitioned(&self, consumer_index: usize, consumers: u64) -> Option<T> {
        let r = self.read_seqs[consumer_index].load(Ordering::Relaxed);
        let w = self.write_seq.load(Ordering::Acquire);
        if r >= w {
            return None;
        }
        let idx = seq_to_index(r, self.mask);
        let v = self.slot(idx).read();
        self.read_seqs[consumer_index].store(r + consumers, Ordering::Release);
        self.signal.notify_all();
        Some(v)
    }

    /// Non-blocking read for callers that want to drive a single consumer
    /// loop themselves instead of using [`Self::start`]. Equivalent to a
    /// single-partition `start(1, ..)`.
    pub fn try_read(&self) -> Option<T> {
        self.try_read_partitioned(0, 1)
    }

    /// Items not yet read by the slowest active consumer partition.
    pub fn len(&self) -> u64 {
        self.write_seq
            .load(Ordering::Acquire)
            .wrapping_sub(self.consumed_through())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free slots available to producers right now.
    pub fn remaining_capacity(&self) -> u64 {
        self.capacity.saturating_sub(self.len())
    }

    pub fn buffer_size(&self) -> u64 {
        self.capacity
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn consumer_panic_count(&self) -> u64 {
        self.consumer_panics.load(Ordering::Relaxed)
    }

    /// Spawns `consumers` real OS threads (1..=[`MAX_CONSUMERS`]), each
    /// draining its own `sequence % consumers == thread_index` partition of
    /// the ring and calling `on_event` for every item it reads, until
    /// [`Self::shutdown`] is called. A panic inside `on_event` is caught,
    /// logged, counted locally (see [`Self::consumer_panic_count`]), and
    /// does not kill the thread that hit it. `on_panic`, if given, is
    /// additionally invoked once per caught panic — callers that expose a
    /// shared metrics surface wire it to that counter here, since the catch
    /// site lives inside this consumer loop rather than in `on_event`.
    ///
    /// # Panics
    /// If `consumers` is `0` or greater than [`MAX_CONSUMERS`].
    pub fn start<F>(
        self: &Arc<Self>,
        consumers: usize,
        wait: WaitStrategy,
        on_event: F,
        on_panic: Option<Arc<dyn Fn() + Send + Sync>>,
    ) -> PipelineHandle
    where
        T: Send + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        assert!(
            (1..=MAX_CONSUMERS).contains(&consumers),
            "consumers must be between 1 and {MAX_CONSUMERS}, got {consumers}"
        );

        for i in 0..consumers {
            self.read_seqs[i].store(i as u64, Ordering::Relaxed);
        }
        self.active_consumers.store(consumers as u64, Ordering::Relaxed);

        let handler = Arc::new(on_event);
        let joins = (0..consumers)
            .map(|thread_index| {
                let shared = Arc::clone(self);
                let handler = Arc::clone(&handler);
                let on_panic = on_panic.clone();
                std::thread::Builder::new()
                    .name(format!("candela-pipeline-consumer-{thread_index}"))
                    .spawn(move || {
                        while shared.running.load(Ordering::Relaxed) {
                            match shared.try_read_partitioned(thread_index, consumers as u64) {
                                Some(v) => {
                                    let result = catch_unwind(AssertUnwindSafe(|| handler(v)));
                                    if result.is_err() {
                                        shared.consumer_panics.fetch_add(1, Ordering::Relaxed);
                                        error!(thread_index, "candela-pipeline consumer callback panicked");
                                        if let Some(cb) = &on_panic {
                                            cb();
                                        }
                                    }
                                }
                                None => wait.idle(&shared.signal),
                            }
                        }
                    })
                    .expect("failed to spawn candela-pipeline consumer thread")
            })
            .collect();

        PipelineHandle { joins }
    }

    /// Signals every consumer thread to stop and joins them all.
    pub fn shutdown(&self, mut handle: PipelineHandle) {
        self.running.store(false, Ordering::Relaxed);
        self.signal.notify_all();
        for join in handle.joins.drain(..) {
            let _ = join.join();
        }
    }
}

/// Handle to the consumer threads started by [`EventPipeline::start`].
pub struct PipelineHandle {
    joins: Vec<JoinHandle<()>>,
}
