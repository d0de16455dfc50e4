use crate::error::StoreError;
use crate::layout::{
    bytes_for_store, hash_key, SlotRecord, StoreHeader, N_SHARDS, SLOT_EMPTY, SLOT_OCCUPIED,
    SLOT_TOMBSTONE,
};
use candela_core::{Candle, Interval, StoreKey, Symbol, MAX_KEY_LEN};
use candela_mmap::{MmapFile, MmapFileMut};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::Ordering;
use tracing::warn;

/// A process-local, memory-mapped, keyed map of `StoreKey -> Candle` with
/// prefix-scan range queries.
///
/// Writes are serialized per write-shard, not globally: two `put`s whose
/// keys hash to different shards never contend.
pub struct CandleStore {
    _mm: MmapFileMut,
    header: *mut StoreHeader,
    slots: *mut SlotRecord,
    capacity: u64,
    shard_size: u64,
    shard_locks: Vec<Mutex<()>>,
}

// SAFETY: all access to the mapped region goes through `header`/`slots`
// under a `shard_locks` entry (for writes) or a shard-scoped lock (for
// scans); the mmap itself is valid for the lifetime of `_mm`.
unsafe impl Send for CandleStore {}
unsafe impl Sync for CandleStore {}

impl CandleStore {
    /// Creates a new store file at `path`, sized for at least
    /// `max_entries` candles (rounded up to a power of two that is also a
    /// multiple of [`N_SHARDS`]).
    pub fn create<P: AsRef<Path>>(path: P, max_entries: u64) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let capacity = capacity_for(max_entries);
        let shard_size = capacity / N_SHARDS as u64;
        let bytes = bytes_for_store(capacity);
        let mut mm = MmapFileMut::create_rw(&path, bytes as u64)?;
        let base = mm.as_mut_ptr();

        let header = base as *mut StoreHeader;
        let slots = unsafe { base.add(size_of::<StoreHeader>()) as *mut SlotRecord };

        unsafe {
            std::ptr::write(header, StoreHeader::new(capacity, shard_size));
            for i in 0..capacity as usize {
                std::ptr::write(slots.add(i), SlotRecord::EMPTY);
            }
        }

        Ok(Self {
            _mm: mm,
            header,
            slots,
            capacity,
            shard_size,
            shard_locks: (0..N_SHARDS).map(|_| Mutex::new(())).collect(),
        })
    }

    /// Opens an existing store file, recovering state from it: durable
    /// under orderly shutdown, with recovery on reopen.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut mm = MmapFileMut::open_rw(&path)?;
        let base = mm.as_mut_ptr();
        let header = base as *mut StoreHeader;
        let slots = unsafe { base.add(size_of::<StoreHeader>()) as *mut SlotRecord };

        let (capacity, shard_size) = unsafe {
            let h = &*header;
            h.validate()?;
            (h.capacity, h.shard_size)
        };

        Ok(Self {
            _mm: mm,
            header,
            slots,
            capacity,
            shard_size,
            shard_locks: (0..N_SHARDS).map(|_| Mutex::new(())).collect(),
        })
    }

    #[inline]
    fn header(&self) -> &StoreHeader {
        unsafe { &*self.header }
    }

    #[inline]
    fn slot(&self, idx: u64) -> &SlotRecord {
        unsafe { &*self.slots.add(idx as usize) }
    }

    #[inline]
    fn slot_mut(&self, idx: u64) -> &mut SlotRecord {
        unsafe { &mut *self.slots.add(idx as usize) }
    }

    fn shard_of(&self, h: u64) -> usize {
        (h as usize) & (N_SHARDS - 1)
    }

    fn shard_range(&self, shard: usize) -> std::ops::Range<u64> {
        let start = shard as u64 * self.shard_size;
        start..(start + self.shard_size)
    }

    /// Inserts or overwrites the candle at `key`. Durable once this
    /// returns `Ok`; callers on the rotation path treat `Err` as
    /// a storage write error and keep the candle in a retry buffer.
    pub fn put(&self, key: StoreKey, candle: Candle) -> Result<(), StoreError> {
        let mut key_buf = [0u8; MAX_KEY_LEN];
        let key_len = key.write_ascii(&mut key_buf);
        let key_bytes = &key_buf[..key_len];
        let h = hash_key(key_bytes);
        let shard = self.shard_of(h);
        let _guard = self.shard_locks[shard].lock();
        let range = self.shard_range(shard);
        let probe_seed = (h >> 6) % self.shard_size;

        let mut first_tombstone: Option<u64> = None;
        for step in 0..self.shard_size {
            let idx = range.start + (probe_seed + step) % self.shard_size;
            let slot = self.slot(idx);
            match slot.state {
                SLOT_EMPTY => {
                    let target = first_tombstone.unwrap_or(idx);
                    self.write_slot(target, key_bytes, candle);
                    self.header().count.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                SLOT_OCCUPIED if slot.key_bytes() == key_bytes => {
                    self.write_slot(idx, key_bytes, candle);
                    return Ok(());
                }
                SLOT_TOMBSTONE if first_tombstone.is_none() => {
                    first_tombstone = Some(idx);
                }
                _ => {}
            }
        }

        if let Some(idx) = first_tombstone {
            self.write_slot(idx, key_bytes, candle);
            self.header().count.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        warn!(key = %key, "candle store shard full");
        Err(StoreError::TableFull)
    }

    fn write_slot(&self, idx: u64, key_bytes: &[u8], candle: Candle) {
        let slot = self.slot_mut(idx);
        slot.key = [0u8; MAX_KEY_LEN];
        slot.key[..key_bytes.len()].copy_from_slice(key_bytes);
        slot.key_len = key_bytes.len() as u8;
        slot.time_ms = candle.time_ms;
        slot.open = candle.open;
        slot.high = candle.high;
        slot.low = candle.low;
        slot.close = candle.close;
        slot.volume = candle.volume;
        slot.state = SLOT_OCCUPIED;
    }

    /// Looks up the candle at `key`, if present.
    pub fn get(&self, key: StoreKey) -> Option<Candle> {
        let mut key_buf = [0u8; MAX_KEY_LEN];
        let key_len = key.write_ascii(&mut key_buf);
        let key_bytes = &key_buf[..key_len];
        let h = hash_key(key_bytes);
        let shard = self.shard_of(h);
        let _guard = self.shard_locks[shard].lock();
        let range = self.shard_range(shard);
        let probe_seed = (h >> 6) % self.shard_size;

        for step in 0..self.shard_size {
            let idx = range.start + (probe_seed + step) % self.shard_size;
            let slot = self.slot(idx);
            match slot.state {
                SLOT_EMPTY => return None,
                SLOT_OCCUPIED if slot.key_bytes() == key_bytes => {
                    return Candle::try_new(
                        slot.time_ms,
                        slot.open,
                        slot.high,
                        slot.low,
                        slot.close,
                        slot.volume,
                    )
                    .ok();
                }
                _ => {}
            }
        }
        None
    }

    /// Returns all candles of one `(symbol, interval)` series whose
    /// `time_ms` falls in `[from_ms, to_ms]`, ordered strictly ascending.
    /// `from_ms > to_ms` yields an empty sequence, not an error.
    pub fn range(&self, symbol: Symbol, interval: Interval, from_ms: i64, to_ms: i64) -> Vec<Candle> {
        if from_ms > to_ms {
            return Vec::new();
        }
        let mut prefix_buf = [0u8; MAX_KEY_LEN];
        let prefix_len = StoreKey::write_series_prefix(symbol, interval, &mut prefix_buf);
        let prefix = &prefix_buf[..prefix_len];

        let mut out = Vec::new();
        for shard in 0..N_SHARDS {
            let _guard = self.shard_locks[shard].lock();
            for idx in self.shard_range(shard) {
                let slot = self.slot(idx);
                if slot.state != SLOT_OCCUPIED {
                    continue;
                }
                if !slot.key_bytes().starts_with(prefix) {
                    continue;
                }
                if slot.time_ms < from_ms || slot.time_ms > to_ms {
                    continue;
                }
                if let Ok(c) = Candle::try_new(
                    slot.time_ms,
                    slot.open,
                    slot.high,
                    slot.low,
                    slot.close,
                    slot.volume,
                ) {
                    out.push(c);
                }
            }
        }
        out.sort_by_key(|c| c.time_ms);
        out
    }

    /// Tombstones every entry with `time_ms < cutoff_ms`, returning the
    /// count removed.
    pub fn delete_older_than(&self, cutoff_ms: i64) -> u64 {
        let mut removed = 0u64;
        for shard in 0..N_SHARDS {
            let _guard = self.shard_locks[shard].lock();
            for idx in self.shard_range(shard) {
                let slot = self.slot_mut(idx);
                if slot.state == SLOT_OCCUPIED && slot.time_ms < cutoff_ms {
                    slot.state = SLOT_TOMBSTONE;
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            self.header().count.fetch_sub(removed, Ordering::Relaxed);
        }
        removed
    }

    /// Total live (non-tombstoned) entry count.
    pub fn count(&self) -> u64 {
        self.header().count.load(Ordering::Relaxed)
    }

    /// Tombstones the single slot holding `key`, if any. Returns whether a
    /// slot was found. Scoped to one key, unlike [`Self::delete_older_than`].
    fn delete_key(&self, key: StoreKey) -> bool {
        let mut key_buf = [0u8; MAX_KEY_LEN];
        let key_len = key.write_ascii(&mut key_buf);
        let key_bytes = &key_buf[..key_len];
        let h = hash_key(key_bytes);
        let shard = self.shard_of(h);
        let _guard = self.shard_locks[shard].lock();
        let range = self.shard_range(shard);
        let probe_seed = (h >> 6) % self.shard_size;

        for step in 0..self.shard_size {
            let idx = range.start + (probe_seed + step) % self.shard_size;
            let slot = self.slot(idx);
            match slot.state {
                SLOT_EMPTY => return false,
                SLOT_OCCUPIED if slot.key_bytes() == key_bytes => {
                    self.slot_mut(idx).state = SLOT_TOMBSTONE;
                    self.header().count.fetch_sub(1, Ordering::Relaxed);
                    return true;
                }
                _ => {}
            }
        }
        false
    }

    /// Liveness probe: a throwaway put/get/delete round-trip against one
    /// reserved key, not a table-wide sweep.
    pub fn is_healthy(&self) -> bool {
        let probe_symbol = match Symbol::parse("HEALTHCHECK") {
            Ok(s) => s,
            Err(_) => return false,
        };
        let key = StoreKey::new(probe_symbol, Interval::S1, 0);
        let candle = Candle::one_shot(0, 1.0);
        if self.put(key, candle).is_err() {
            return false;
        }
        let ok = self.get(key).is_some();
        self.delete_key(key);
        ok
    }

    /// Flushes the backing mmap to disk. Called at controlled shutdown so
    /// the last rotations are durable across restart.
    pub fn flush(&self) -> Result<(), StoreError> {
        self._mm.flush()?;
        Ok(())
    }
}

fn capacity_for(max_entries: u64) -> u64 {
    let min_capacity = (max_entries.max(N_SHARDS as u64)).next_power_of_two();
    // Ensure capacity is also a multiple of N_SHARDS (both are powers of
    // two already, so this only matters when capacity < N_SHARDS).
    min_capacity.max(N_SHARDS as u64)
}

/// Opens a store read-only for query-side collaborators that never write
/// (mirrors [`MmapFile::open_ro`]; kept separate from [`CandleStore`] since
/// its write contract does not apply here).
pub struct ReadOnlyCandleStore {
    _mm: MmapFile,
    header: *const StoreHeader,
    slots: *const SlotRecord,
    shard_size: u64,
}

unsafe impl Send for ReadOnlyCandleStore {}
unsafe impl Sync for ReadOnlyCandleStore {}

impl ReadOnlyCandleStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mm = MmapFile::open_ro(&path)?;
        let base = mm.as_ptr();
        let header = base as *const StoreHeader;
        let slots = unsafe { base.add(size_of::<StoreHeader>()) as *const SlotRecord };
        let shard_size = unsafe {
            (&*header).validate()?;
            (&*header).shard_size
        };
        Ok(Self {
            _mm: mm,
            header,
            slots,
            shard_size,
        })
    }

    pub fn count(&self) -> u64 {
        unsafe { (&*self.header).count.load(Ordering::Relaxed) }
    }

    pub fn range(&self, symbol: Symbol, interval: Interval, from_ms: i64, to_ms: i64) -> Vec<Candle> {
        if from_ms > to_ms {
            return Vec::new();
        }
        let mut prefix_buf = [0u8; MAX_KEY_LEN];
        let prefix_len = StoreKey::write_series_prefix(symbol, interval, &mut prefix_buf);
        let prefix = &prefix_buf[..prefix_len];
        let capacity = unsafe { (&*self.header).capacity };

        let mut out = Vec::new();
        for idx in 0..capacity {
            let slot = unsafe { &*self.slots.add(idx as usize) };
            if slot.state != SLOT_OCCUPIED || !slot.key_bytes().starts_with(prefix) {
                continue;
            }
            if slot.time_ms < from_ms || slot.time_ms > to_ms {
                continue;
            }
            if let Ok(c) =
                Candle::try_new(slot.time_ms, slot.open, slot.high, slot.low, slot.close, slot.volume)
            {
                out.push(c);
            }
        }
        out.sort_by_key(|c| c.time_ms);
        let _ = self.shard_size; // retained for symmetry with CandleStore's layout assumptions
        out
    }
}
