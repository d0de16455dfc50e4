//! Sharded concurrent map from `(symbol, interval)` to the in-flight
//! `MutableCell` for that series (component C6's `ActiveCells`).
//!
//! A true lock-free concurrent hash map isn't part of the standard library;
//! per the sharded-map allowance, this splits the key space into
//! [`N_SHARDS`] independently-locked buckets so that two keys hashing to
//! different shards never contend (mirrors `onyx-core`'s choice to trade a
//! general hash map for a structure shaped around the access pattern, and
//! `candela-store`'s own write sharding).

use candela_core::{Interval, MutableCell, Symbol};
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;

pub const N_SHARDS: usize = 64;

pub struct ActiveCells {
    shards: Vec<Mutex<HashMap<(Symbol, Interval), MutableCell>>>,
}

impl ActiveCells {
    pub fn new() -> Self {
        Self {
            shards: (0..N_SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard_index(symbol: Symbol, interval: Interval) -> usize {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in symbol.as_str().as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        h ^= interval as u64;
        h = h.wrapping_mul(0x100000001b3);
        (h as usize) & (N_SHARDS - 1)
    }

    /// Locks the shard containing `(symbol, interval)`. Callers do their
    /// cell lookup/insert/mutate/replace within the returned guard's scope;
    /// this is the per-key critical section required by the aggregator's
    /// atomicity contract.
    pub fn lock_shard(
        &self,
        symbol: Symbol,
        interval: Interval,
    ) -> MutexGuard<'_, HashMap<(Symbol, Interval), MutableCell>> {
        self.shards[Self::shard_index(symbol, interval)].lock()
    }

    /// Locks every shard in a fixed order (ascending index) and calls `f`
    /// once per entry, for `flush_all`. Each shard is drained and cleared
    /// before moving to the next.
    pub fn drain_all<F: FnMut((Symbol, Interval), MutableCell)>(&self, mut f: F) {
        for shard in &self.shards {
            let mut guard = shard.lock();
            for (key, cell) in guard.drain() {
                f(key, cell);
            }
        }
    }
}

impl Default for ActiveCells {
    fn default() -> Self {
        Self::new()
    }
}
