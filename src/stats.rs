//! Statistics reporting for the index.
//!
//! The surrounding cache engine usually exposes the table's hashpower, byte
//! footprint and expansion flag through its own stats pipeline. The index
//! reports those through a [`StatsSink`], which defaults to the no-op
//! [`DisabledStatsSink`]. [`AtomicStats`] is a ready-made sink for engines
//! (and tests) that just want the current values.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};

/// Receives table-level events from a [`HashIndex`][hash-index].
///
/// All methods have no-op defaults; implementors override the ones they care
/// about. Calls are made while the index holds internal locks, so
/// implementations must be cheap and must not call back into the index.
///
/// [hash-index]: ./struct.HashIndex.html
pub trait StatsSink: Send + Sync + 'static {
    /// A bucket array became authoritative: at startup, and again at every
    /// doubling. `table_bytes` counts both arrays while two are live.
    #[allow(unused_variables)]
    fn table_resized(&self, hashpower: u8, table_bytes: usize) {}

    /// A doubling has begun; migration is now in progress.
    fn expansion_started(&self) {}

    /// Migration finished and the aging array was retired. `table_bytes` is
    /// back to counting a single array.
    #[allow(unused_variables)]
    fn expansion_completed(&self, table_bytes: usize) {}

    /// `count` buckets were migrated out of the aging array.
    #[allow(unused_variables)]
    fn buckets_migrated(&self, count: usize) {}
}

/// A `StatsSink` that records nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledStatsSink;

impl StatsSink for DisabledStatsSink {}

/// Point-in-time view of an [`AtomicStats`] sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub hashpower: u8,
    pub table_bytes: usize,
    pub is_expanding: bool,
    pub buckets_migrated: u64,
}

/// A `StatsSink` keeping the current values in relaxed atomics.
#[derive(Debug, Default)]
pub struct AtomicStats {
    hashpower: AtomicU8,
    table_bytes: AtomicUsize,
    is_expanding: AtomicBool,
    buckets_migrated: AtomicU64,
}

impl AtomicStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hashpower: self.hashpower.load(Ordering::Relaxed),
            table_bytes: self.table_bytes.load(Ordering::Relaxed),
            is_expanding: self.is_expanding.load(Ordering::Relaxed),
            buckets_migrated: self.buckets_migrated.load(Ordering::Relaxed),
        }
    }
}

impl StatsSink for AtomicStats {
    fn table_resized(&self, hashpower: u8, table_bytes: usize) {
        self.hashpower.store(hashpower, Ordering::Relaxed);
        self.table_bytes.store(table_bytes, Ordering::Relaxed);
    }

    fn expansion_started(&self) {
        self.is_expanding.store(true, Ordering::Relaxed);
    }

    fn expansion_completed(&self, table_bytes: usize) {
        self.table_bytes.store(table_bytes, Ordering::Relaxed);
        self.is_expanding.store(false, Ordering::Relaxed);
    }

    fn buckets_migrated(&self, count: usize) {
        self.buckets_migrated
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::{AtomicStats, StatsSink};

    #[test]
    fn snapshot_tracks_events() {
        let stats = AtomicStats::default();
        stats.table_resized(4, 128);
        stats.expansion_started();
        stats.buckets_migrated(3);
        stats.buckets_migrated(5);

        let snap = stats.snapshot();
        assert_eq!(snap.hashpower, 4);
        assert_eq!(snap.table_bytes, 128);
        assert!(snap.is_expanding);
        assert_eq!(snap.buckets_migrated, 8);

        stats.expansion_completed(256);
        let snap = stats.snapshot();
        assert!(!snap.is_expanding);
        assert_eq!(snap.table_bytes, 256);
    }
}
