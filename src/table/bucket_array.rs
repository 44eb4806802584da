use std::{cell::UnsafeCell, collections::TryReserveError, mem};

use crate::entry::EntryRef;

/// One generation of bucket storage: a power-of-two array of bucket heads.
///
/// This is pure storage with no policy and no internal locking. A bucket head
/// may only be dereferenced while the caller holds the stripe lock covering
/// that bucket (every chain in the table is guarded that way), and the array
/// itself is only ever swapped or dropped under the exclusive gate guard.
pub(crate) struct BucketArray<V> {
    slots: Box<[UnsafeCell<Option<EntryRef<V>>>]>,
}

// Heads are `UnsafeCell`s, so `Sync` is not derived. Sharing is sound
// because every dereference happens under the bucket's stripe lock.
unsafe impl<V: Send + Sync> Sync for BucketArray<V> {}

impl<V> BucketArray<V> {
    /// Allocates `2^hashpower` empty buckets.
    ///
    /// Allocation is fallible: running out of memory is a condition the
    /// maintenance task recovers from (it keeps the current table and tries
    /// again later), not a crash.
    pub(crate) fn alloc(hashpower: u8) -> Result<Self, TryReserveError> {
        let len = 1usize << hashpower;
        let mut slots = Vec::new();
        slots.try_reserve_exact(len)?;
        slots.resize_with(len, || UnsafeCell::new(None));
        Ok(Self {
            slots: slots.into_boxed_slice(),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// The bucket a hash falls into in this array.
    pub(crate) fn bucket_index(&self, hash: u32) -> usize {
        (hash as usize) & (self.slots.len() - 1)
    }

    /// Heap footprint of this array, as reported to the stats sink.
    pub(crate) fn byte_size(&self) -> usize {
        self.slots.len() * mem::size_of::<UnsafeCell<Option<EntryRef<V>>>>()
    }

    /// Pointer to the head link of bucket `index`. Dereferencing requires
    /// the stripe lock covering `index`.
    pub(crate) fn head_ptr(&self, index: usize) -> *mut Option<EntryRef<V>> {
        self.slots[index].get()
    }
}

impl<V> Drop for BucketArray<V> {
    fn drop(&mut self) {
        // `&mut self` means no lock is needed here. Unlink each chain
        // iteratively so dropping a long chain cannot recurse entry-by-entry
        // through the stack.
        for slot in self.slots.iter() {
            let mut cur = unsafe { (*slot.get()).take() };
            while let Some(entry) = cur {
                cur = unsafe { entry.take_next() };
            }
        }
    }
}
