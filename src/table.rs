//! The key index of the cache: a chained hash table that doubles in place,
//! one bucket at a time.
//!
//! The table keeps up to two generations of bucket storage. `current` is
//! authoritative for every bucket except those an in-progress expansion has
//! not migrated yet; those still live in `aging`, the previous, half-sized
//! generation. A single background task ([`Maintainer`][maintainer]) drains
//! `aging` bucket by bucket, so growth never stops the world for a full
//! rehash; the only global step is the pointer swap that makes the doubled
//! array current, done under the exclusive gate guard.
//!
//! Foreground operations take the gate's shared guard, then the stripe lock
//! covering their bucket, and only then read the expansion cursor to decide
//! which generation to touch. Acquiring the stripe first is what makes the
//! lock-free cursor read sound: the migration step publishes its cursor
//! advance before releasing the same stripe, so whoever holds the stripe
//! sees a cursor that is exact for their own bucket. A stale value for
//! *other* buckets is harmless by construction.
//!
//! [maintainer]: ./struct.Maintainer.html

pub(crate) mod bucket_array;
pub(crate) mod chain;
pub(crate) mod expansion;

use std::sync::{
    atomic::{AtomicU8, AtomicUsize, Ordering},
    Arc,
};

use crate::{
    config::Config,
    entry::EntryRef,
    error::{IndexError, InsertError},
    gate::Gate,
    locks::StripedLocks,
    maintenance::MaintenanceShared,
    stats::{DisabledStatsSink, StatsSink},
};

use bucket_array::BucketArray;

pub(crate) fn hashsize(power: u8) -> u64 {
    1u64 << power
}

/// The live bucket-array generations. Swapped and retired only under the
/// exclusive gate guard.
pub(crate) struct Tables<V> {
    pub(crate) current: BucketArray<V>,
    /// The previous generation. `Some` from the pointer swap until the last
    /// bucket has been migrated and the array retired.
    pub(crate) aging: Option<BucketArray<V>>,
}

impl<V> Tables<V> {
    /// Picks the array and bucket index authoritative for `hash`, given the
    /// expansion cursor read under the caller's stripe lock.
    ///
    /// A bucket of the aging array that the cursor has not reached yet still
    /// holds its entries; everything else, including buckets of a fully
    /// drained aging array awaiting retirement, is served by `current`.
    fn locate(&self, hash: u32, expand_cursor: usize) -> (&BucketArray<V>, usize) {
        if let Some(aging) = self.aging.as_ref() {
            let old_index = aging.bucket_index(hash);
            if old_index >= expand_cursor {
                return (aging, old_index);
            }
        }
        (&self.current, self.current.bucket_index(hash))
    }
}

pub(crate) struct Inner<V> {
    pub(crate) gate: Gate<Tables<V>>,
    /// Mirror of `log2(tables.current.len())`, written only under the
    /// exclusive gate guard. The growth trigger and introspection read it
    /// without any lock; the authoritative value is the array length.
    pub(crate) hashpower: AtomicU8,
    /// Next aging bucket to migrate. Written by the maintenance task while
    /// it holds that bucket's stripe; read by foreground operations under
    /// their own stripe.
    pub(crate) expand_cursor: AtomicUsize,
    pub(crate) locks: Arc<StripedLocks>,
    pub(crate) stats: Arc<dyn StatsSink>,
    pub(crate) config: Config,
    pub(crate) maint: Arc<MaintenanceShared>,
}

impl<V> Inner<V> {
    pub(crate) fn is_expanding(&self) -> bool {
        self.gate.enter().aging.is_some()
    }

    /// The growth condition: load factor above 3/2 with headroom left below
    /// the hashpower ceiling.
    pub(crate) fn should_expand(&self, item_count: u64) -> bool {
        let hashpower = self.hashpower.load(Ordering::Relaxed);
        item_count > hashsize(hashpower) * 3 / 2 && hashpower < self.config.max_hashpower
    }
}

/// A concurrent hash index from byte keys to caller-owned entries.
///
/// This is the lookup structure of an in-memory cache, not a general-purpose
/// map: it stores [`Entry`][entry] records created by the surrounding engine
/// (which also precomputes their hashes and tracks the total item count) and
/// supports exactly point lookup, insert of an absent key, and removal.
/// Cloning the handle is cheap and shares the table.
///
/// Growth happens in the background: after each successful insert the engine
/// calls [`notify_insert`][notify] with its item count, and a
/// [`Maintainer`][maintainer] task doubles the table incrementally once the
/// load factor passes 3/2.
///
/// [entry]: ./struct.Entry.html
/// [notify]: #method.notify_insert
/// [maintainer]: ./struct.Maintainer.html
pub struct HashIndex<V> {
    pub(crate) inner: Arc<Inner<V>>,
}

impl<V> Clone for HashIndex<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> HashIndex<V> {
    /// Creates an index with its own lock striping and no stats reporting.
    pub fn new(config: Config) -> Result<Self, IndexError> {
        let config = config.normalized();
        let locks = Arc::new(StripedLocks::with_power(config.lock_power));
        Self::with_collaborators(config, locks, Arc::new(DisabledStatsSink))
    }

    /// Creates an index sharing the engine's lock striping and stats sink.
    ///
    /// The engine is expected to serialize its own per-entry work under the
    /// same `locks`, keyed by each key's hash, so that entry state and
    /// bucket membership change under one lock.
    ///
    /// # Panics
    ///
    /// Panics if `locks` has more stripes than the initial table has
    /// buckets; a stripe must never span less than a whole bucket.
    pub fn with_collaborators(
        config: Config,
        locks: Arc<StripedLocks>,
        stats: Arc<dyn StatsSink>,
    ) -> Result<Self, IndexError> {
        let config = config.normalized();
        assert!(
            locks.stripe_count() as u64 <= hashsize(config.initial_hashpower),
            "{} lock stripes cannot cover 2^{} buckets",
            locks.stripe_count(),
            config.initial_hashpower,
        );

        let current = BucketArray::alloc(config.initial_hashpower)?;
        stats.table_resized(config.initial_hashpower, current.byte_size());

        Ok(Self {
            inner: Arc::new(Inner {
                gate: Gate::new(Tables {
                    current,
                    aging: None,
                }),
                hashpower: AtomicU8::new(config.initial_hashpower),
                expand_cursor: AtomicUsize::new(0),
                locks,
                stats,
                config,
                maint: Arc::new(MaintenanceShared::default()),
            }),
        })
    }

    /// Returns the entry stored under `key`, or `None`. `hash` must be the
    /// same value the engine computed when the entry was created.
    ///
    /// Lookups during an in-progress expansion transparently fall back to
    /// the aging array for buckets that have not been migrated yet.
    pub fn find(&self, key: &[u8], hash: u32) -> Option<EntryRef<V>> {
        let inner = &*self.inner;
        let tables = inner.gate.enter();
        let _stripe = inner.locks.lock(hash as usize);
        let cursor = inner.expand_cursor.load(Ordering::Acquire);
        let (array, index) = tables.locate(hash, cursor);
        unsafe { chain::find(array, index, key) }
    }

    /// Links `entry` into its bucket, newest first.
    ///
    /// The key must not already be present. Rather than leaving that as an
    /// unchecked caller contract, the chain is re-scanned under the bucket's
    /// stripe lock and a duplicate is reported as
    /// [`InsertError::DuplicateKey`], leaving the table unchanged.
    pub fn insert(&self, entry: EntryRef<V>) -> Result<(), InsertError> {
        let inner = &*self.inner;
        let tables = inner.gate.enter();
        let _stripe = inner.locks.lock(entry.hash() as usize);
        let cursor = inner.expand_cursor.load(Ordering::Acquire);
        let (array, index) = tables.locate(entry.hash(), cursor);
        unsafe {
            if chain::find(array, index, entry.key()).is_some() {
                return Err(InsertError::DuplicateKey);
            }
            chain::insert(array, index, entry);
        }
        Ok(())
    }

    /// Unlinks and returns the entry stored under `key`; `None` means the
    /// key was not present, which is an ordinary outcome.
    pub fn remove(&self, key: &[u8], hash: u32) -> Option<EntryRef<V>> {
        let inner = &*self.inner;
        let tables = inner.gate.enter();
        let _stripe = inner.locks.lock(hash as usize);
        let cursor = inner.expand_cursor.load(Ordering::Acquire);
        let (array, index) = tables.locate(hash, cursor);
        unsafe { chain::remove(array, index, key) }
    }

    /// Growth-trigger hook; the engine calls this with its current item
    /// count after every successful insert.
    ///
    /// The check is lock-minimal: it takes the maintenance task's signal
    /// lock only if it is free and silently skips otherwise; some later
    /// insert will signal instead. Passing the check latches a wakeup for
    /// the maintenance task.
    pub fn notify_insert(&self, current_item_count: u64) {
        let inner = &*self.inner;
        if let Some(mut state) = inner.maint.state.try_lock() {
            if inner.should_expand(current_item_count) {
                state.signaled = true;
                inner.maint.trigger.notify_one();
                log::trace!("growth signaled at {current_item_count} items");
            }
        }
    }

    /// Current table size exponent; the table has `2^hashpower` buckets.
    /// Never decreases.
    pub fn hashpower(&self) -> u8 {
        self.inner.hashpower.load(Ordering::Relaxed)
    }

    pub fn num_buckets(&self) -> usize {
        1usize << self.hashpower()
    }

    /// Whether a doubling is currently migrating buckets.
    pub fn is_expanding(&self) -> bool {
        self.inner.is_expanding()
    }

    /// Heap footprint of the bucket arrays, counting both generations while
    /// an expansion is in progress.
    pub fn table_bytes(&self) -> usize {
        let tables = self.inner.gate.enter();
        tables.current.byte_size()
            + tables
                .aging
                .as_ref()
                .map_or(0, BucketArray::byte_size)
    }
}
