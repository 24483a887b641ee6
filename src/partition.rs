//! Key-hash routing for the reduce stage.
//!
//! All records sharing a key must reach the same reducer. The hash is
//! [`FxHasher`](rustc_hash::FxHasher) over the raw key bytes: fast,
//! non-cryptographic, and unseeded, so a key maps to the same partition on every
//! run and every thread. Partition indices are only stable for a fixed partition
//! count; there is no rebalancing.

use rustc_hash::FxHasher;
use std::hash::Hasher;

/// Deterministic 64-bit hash of a record key.
#[must_use]
pub fn key_hash(key: &str) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(key.as_bytes());
    hasher.finish()
}

/// Reducer index for `key` among `partitions` reducers.
///
/// # Panics
/// If `partitions` is zero. Stages validate their worker count before routing.
#[must_use]
pub fn partition_for(key: &str, partitions: usize) -> usize {
    assert!(partitions > 0, "partition count must be positive");
    // widening to u64 first keeps the whole hash in play on 32-bit targets
    (key_hash(key) % partitions as u64) as usize
}
