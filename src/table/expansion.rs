//! The expansion state machine.
//!
//! An expansion is `start` (the one globally visible step: allocate the
//! doubled array and swap it in as `current`, demoting the old array to
//! `aging`), followed by one `migrate_one_bucket` call per aging bucket,
//! followed by `finish` (retire the drained aging array). Between those
//! calls the table is fully usable; routing in `Tables::locate` hides the
//! split from every foreground operation.
//!
//! Only the maintenance task calls into this module, one call at a time, so
//! the cursor has a single writer.

use std::{mem, sync::atomic::Ordering};

use crate::{
    error::IndexError,
    table::{bucket_array::BucketArray, chain, Inner},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MigrateOutcome {
    /// One bucket was relinked; more remain.
    Migrated,
    /// The bucket's stripe was held by a foreground operation; nothing was
    /// done. Back off and retry on the next turn.
    Contended,
    /// The last aging bucket has been drained; the aging array is ready to
    /// be retired via `finish_expansion`.
    Finished,
    /// No expansion is in progress.
    Idle,
}

impl<V> Inner<V> {
    /// Doubles the table: allocates a `2^(hashpower+1)` array, makes it
    /// `current` and demotes the old array to `aging`, all under the
    /// exclusive gate guard so every foreground thread observes the swap,
    /// the new hashpower and the reset cursor as one step.
    ///
    /// On allocation failure the table is left exactly as it was and the
    /// error is returned; the maintenance task logs it and waits for a
    /// later growth signal. Load factor exceeds its target until then.
    pub(crate) fn start_expansion(&self) -> Result<(), IndexError> {
        let mut tables = self.gate.pause_all();
        debug_assert!(
            tables.aging.is_none(),
            "doubling started while another expansion is migrating"
        );

        let new_hashpower = self.hashpower.load(Ordering::Relaxed) + 1;
        let new_current = BucketArray::alloc(new_hashpower)?;

        let old = mem::replace(&mut tables.current, new_current);
        tables.aging = Some(old);
        self.expand_cursor.store(0, Ordering::Release);
        self.hashpower.store(new_hashpower, Ordering::Release);

        let table_bytes = tables.current.byte_size()
            + tables.aging.as_ref().map_or(0, BucketArray::byte_size);
        self.stats.expansion_started();
        self.stats.table_resized(new_hashpower, table_bytes);
        log::debug!("hash table expanding to 2^{new_hashpower} buckets");
        Ok(())
    }

    /// Relinks every entry of the aging bucket at the cursor into the
    /// doubled array and advances the cursor.
    ///
    /// The stripe lock is only tried, never waited on: a foreground
    /// operation holding the bucket wins, and migration retries on the next
    /// scheduling turn instead of stalling it.
    pub(crate) fn migrate_one_bucket(&self) -> MigrateOutcome {
        let tables = self.gate.enter();
        let aging = match tables.aging.as_ref() {
            Some(aging) => aging,
            None => return MigrateOutcome::Idle,
        };
        let cursor = self.expand_cursor.load(Ordering::Acquire);
        if cursor >= aging.len() {
            return MigrateOutcome::Finished;
        }

        let _stripe = match self.locks.try_lock(cursor) {
            Some(guard) => guard,
            None => return MigrateOutcome::Contended,
        };

        // Both split targets of this bucket (`cursor` and
        // `cursor + aging.len()` in the doubled array) are covered by the
        // stripe acquired above, so one lock serializes the whole relink
        // against every foreground operation on these entries.
        unsafe {
            let mut cur = (*aging.head_ptr(cursor)).take();
            while let Some(entry) = cur {
                cur = entry.take_next();
                let index = tables.current.bucket_index(entry.hash());
                chain::insert(&tables.current, index, entry);
            }
        }

        let next = cursor + 1;
        // Publish the advance before the stripe guard drops: whoever takes
        // this stripe next must route past the drained bucket.
        self.expand_cursor.store(next, Ordering::Release);
        self.stats.buckets_migrated(1);

        if next == aging.len() {
            MigrateOutcome::Finished
        } else {
            MigrateOutcome::Migrated
        }
    }

    /// Retires the drained aging array and resets the cursor, under the
    /// exclusive gate guard so that no foreground thread can still be
    /// reading the array when it is freed.
    pub(crate) fn finish_expansion(&self) {
        let mut tables = self.gate.pause_all();
        if let Some(aging) = tables.aging.take() {
            debug_assert_eq!(self.expand_cursor.load(Ordering::Acquire), aging.len());
        }
        self.expand_cursor.store(0, Ordering::Release);
        self.stats.expansion_completed(tables.current.byte_size());
        log::debug!(
            "hash table expansion done: 2^{} buckets",
            self.hashpower.load(Ordering::Relaxed)
        );
    }
}
