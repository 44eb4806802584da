//! Operations on a single bucket chain.
//!
//! A bucket is a singly-linked list of entries threaded through their
//! next-in-bucket links, newest first. The same three operations serve both
//! the current and the aging array; callers pick the array and bucket.
//!
//! Every function here requires the caller to hold the stripe lock covering
//! the bucket, which is why they are `unsafe`. Insertion prepends, removal
//! unlinks in place, so a chain is never in a torn state for anyone holding
//! the lock.

use crate::entry::EntryRef;
use crate::table::bucket_array::BucketArray;

/// Returns the first entry in the bucket whose key is byte-for-byte equal to
/// `key`. No side effects.
///
/// Hash collisions make same-bucket entries with different keys ordinary, so
/// matching is always exact key equality (length and bytes), never hash
/// equality.
///
/// # Safety
///
/// The caller must hold the stripe lock covering bucket `index` of `array`.
pub(crate) unsafe fn find<V>(
    array: &BucketArray<V>,
    index: usize,
    key: &[u8],
) -> Option<EntryRef<V>> {
    let mut cur = (*array.head_ptr(index)).clone();
    while let Some(entry) = cur {
        if entry.key() == key {
            return Some(entry);
        }
        cur = (*entry.next_ptr()).clone();
    }
    None
}

/// Prepends `entry` to the bucket, making it immediately visible to
/// subsequent finds in this bucket.
///
/// The caller is responsible for having ruled out a duplicate key; this
/// function links unconditionally.
///
/// # Safety
///
/// The caller must hold the stripe lock covering bucket `index` of `array`,
/// and `entry` must not currently be linked into any bucket.
pub(crate) unsafe fn insert<V>(array: &BucketArray<V>, index: usize, entry: EntryRef<V>) {
    let head = array.head_ptr(index);
    *entry.next_ptr() = (*head).take();
    *head = Some(entry);
}

/// Unlinks and returns the first entry with a byte-for-byte equal key, or
/// `None` if the bucket has no such entry.
///
/// # Safety
///
/// The caller must hold the stripe lock covering bucket `index` of `array`.
pub(crate) unsafe fn remove<V>(
    array: &BucketArray<V>,
    index: usize,
    key: &[u8],
) -> Option<EntryRef<V>> {
    // Walk the chain keeping a pointer to the link that points at the
    // current entry, so unlinking is a single link rewrite whether the match
    // is the head or mid-chain.
    let mut link = array.head_ptr(index);
    while let Some(entry) = (*link).as_ref() {
        if entry.key() == key {
            break;
        }
        link = entry.next_ptr();
    }
    let entry = (*link).take()?;
    *link = entry.take_next();
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;

    // The tests below run single-threaded with exclusive access to the
    // array, which satisfies the stripe-lock contract of the chain
    // operations.

    fn new_array() -> BucketArray<u32> {
        BucketArray::alloc(2).unwrap()
    }

    #[test]
    fn find_in_empty_bucket() {
        let array = new_array();
        assert!(unsafe { find(&array, 0, b"nope") }.is_none());
    }

    #[test]
    fn insert_then_find() {
        let array = new_array();
        unsafe {
            insert(&array, 1, Entry::new(&b"a"[..], 1, 10));
            insert(&array, 1, Entry::new(&b"b"[..], 1, 20));
            insert(&array, 1, Entry::new(&b"c"[..], 1, 30));

            assert_eq!(*find(&array, 1, b"a").unwrap().value(), 10);
            assert_eq!(*find(&array, 1, b"b").unwrap().value(), 20);
            assert_eq!(*find(&array, 1, b"c").unwrap().value(), 30);
            assert!(find(&array, 1, b"d").is_none());
            // Different bucket, same keys: not found.
            assert!(find(&array, 2, b"a").is_none());
        }
    }

    #[test]
    fn colliding_hashes_do_not_match_by_key() {
        let array = new_array();
        unsafe {
            // Same hash, same bucket, different bytes.
            insert(&array, 3, Entry::new(&b"ab"[..], 3, 1));
            insert(&array, 3, Entry::new(&b"ba"[..], 3, 2));

            assert_eq!(*find(&array, 3, b"ab").unwrap().value(), 1);
            assert_eq!(*find(&array, 3, b"ba").unwrap().value(), 2);
            assert!(find(&array, 3, b"aa").is_none());
            // A prefix of a stored key is a different key.
            assert!(find(&array, 3, b"a").is_none());
        }
    }

    #[test]
    fn remove_head_middle_tail() {
        let array = new_array();
        unsafe {
            for (key, value) in [(&b"x"[..], 1), (&b"y"[..], 2), (&b"z"[..], 3)] {
                insert(&array, 0, Entry::new(key, 0, value));
            }

            // "z" is the head after prepends; "x" is the tail.
            let middle = remove(&array, 0, b"y").unwrap();
            assert_eq!(*middle.value(), 2);
            let head = remove(&array, 0, b"z").unwrap();
            assert_eq!(*head.value(), 3);
            let tail = remove(&array, 0, b"x").unwrap();
            assert_eq!(*tail.value(), 1);

            assert!(remove(&array, 0, b"x").is_none());
            assert!((*array.head_ptr(0)).is_none());
        }
    }

    #[test]
    fn remove_missing_key_is_a_clean_not_found() {
        let array = new_array();
        unsafe {
            insert(&array, 2, Entry::new(&b"keep"[..], 2, 7));
            assert!(remove(&array, 2, b"gone").is_none());
            assert_eq!(*find(&array, 2, b"keep").unwrap().value(), 7);
        }
    }

    #[test]
    fn reinsert_after_remove() {
        let array = new_array();
        unsafe {
            insert(&array, 0, Entry::new(&b"k"[..], 0, 1));
            let removed = remove(&array, 0, b"k").unwrap();
            assert!(removed.take_next().is_none());
            insert(&array, 0, removed);
            assert_eq!(*find(&array, 0, b"k").unwrap().value(), 1);
        }
    }
}
