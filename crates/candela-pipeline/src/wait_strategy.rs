use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// How a producer or the consumer backs off when the ring has no room (or
/// no new item) rather than spinning forever.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Busy-spin with a CPU hint. Lowest latency, burns a full core.
    Spin,
    /// Yield the OS thread each attempt. Cheaper than spinning, still
    /// latency-sensitive.
    Yield,
    /// Sleep a fixed duration between attempts.
    Sleep(Duration),
    /// Park the thread and wait to be woken by the producer/consumer side.
    /// Highest latency, lowest CPU usage.
    Block,
}

impl WaitStrategy {
    /// Backs off once according to the strategy. `signal` is woken whenever
    /// `Block` should be used; other strategies ignore it.
    pub(crate) fn idle(&self, signal: &Signal) {
        match self {
            WaitStrategy::Spin => std::hint::spin_loop(),
            WaitStrategy::Yield => std::thread::yield_now(),
            WaitStrategy::Sleep(d) => std::thread::sleep(*d),
            WaitStrategy::Block => signal.wait_timeout(Duration::from_millis(50)),
        }
    }
}

/// A condvar-backed wakeup used only by [`WaitStrategy::Block`]. Kept
/// separate from the strategy enum itself since it needs interior state.
pub(crate) struct Signal {
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl Signal {
    pub(crate) fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    pub(crate) fn wait_timeout(&self, max: Duration) {
        let guard = self.mutex.lock().unwrap();
        let _ = self.condvar.wait_timeout(guard, max);
    }

    pub(crate) fn notify_all(&self) {
        self.condvar.notify_all();
    }
}
