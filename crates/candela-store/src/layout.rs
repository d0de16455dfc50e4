//! Binary layout of the memory-mapped candle store file.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  magic │ version │ capacity │ shard_size │ count │   pad     │  (64 B header)
//! ├──────────────────────────────────────────────────────────────┤
//! │  SlotRecord[0]                                                │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ...                                                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  SlotRecord[capacity-1]                                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each [`SlotRecord`] holds the candle's six-field payload plus its
//! serialized [`candela_core::StoreKey`] inline (no heap, no indirection) so
//! that a slot's liveness and contents are read with a single pointer
//! dereference.

use candela_core::MAX_KEY_LEN;
use std::sync::atomic::AtomicU64;

/// ASCII "CANDELAS" packed big-endian into a `u64`, identifying a valid
/// store file.
pub const STORE_MAGIC: u64 = 0x4341_4E44_454C_4153;

/// Current on-disk format version. Bump when `SlotRecord`'s layout changes.
pub const STORE_VERSION: u64 = 1;

/// Number of independent write shards: a sharded map keyed by hash, with
/// per-shard mutual exclusion, instead of one lock for the whole table.
pub const N_SHARDS: usize = 64;

#[repr(C)]
pub struct StoreHeader {
    pub magic: u64,
    pub version: u64,
    /// Total slot count. Power of two, and a multiple of `N_SHARDS`.
    pub capacity: u64,
    /// `capacity / N_SHARDS`, also a power of two.
    pub shard_size: u64,
    /// Live (occupied, non-tombstoned) entry count.
    pub count: AtomicU64,
    _pad: [u8; 24],
}

impl StoreHeader {
    pub fn new(capacity: u64, shard_size: u64) -> Self {
        Self {
            magic: STORE_MAGIC,
            version: STORE_VERSION,
            capacity,
            shard_size,
            count: AtomicU64::new(0),
            _pad: [0; 24],
        }
    }

    pub fn validate(&self) -> Result<(), crate::StoreError> {
        if self.magic != STORE_MAGIC {
            return Err(crate::StoreError::Corrupt("bad magic".into()));
        }
        if self.version != STORE_VERSION {
            return Err(crate::StoreError::Corrupt("version mismatch".into()));
        }
        if !(self.capacity as usize).is_power_of_two() {
            return Err(crate::StoreError::Corrupt("capacity not power of two".into()));
        }
        Ok(())
    }
}

/// A single candle slot, fixed layout. `state` discriminates empty /
/// occupied / tombstone (a deleted slot is tombstoned rather than zeroed so
/// linear probes for other keys in the same shard do not stop early).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct SlotRecord {
    pub state: u8,
    pub key_len: u8,
    pub key: [u8; MAX_KEY_LEN],
    pub time_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

pub const SLOT_EMPTY: u8 = 0;
pub const SLOT_OCCUPIED: u8 = 1;
pub const SLOT_TOMBSTONE: u8 = 2;

impl SlotRecord {
    pub const EMPTY: SlotRecord = SlotRecord {
        state: SLOT_EMPTY,
        key_len: 0,
        key: [0; MAX_KEY_LEN],
        time_ms: 0,
        open: 0.0,
        high: 0.0,
        low: 0.0,
        close: 0.0,
        volume: 0,
    };

    #[inline]
    pub fn key_bytes(&self) -> &[u8] {
        &self.key[..self.key_len as usize]
    }
}

/// Total bytes required for a store region of `capacity` slots.
pub fn bytes_for_store(capacity: u64) -> usize {
    size_of::<StoreHeader>() + capacity as usize * size_of::<SlotRecord>()
}

/// FNV-1a over the key bytes. Used both to pick a write shard and as the
/// probe seed within that shard.
#[inline]
pub fn hash_key(key: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for &b in key {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}
