use std::{cell::UnsafeCell, fmt};

use triomphe::Arc as TrioArc;

/// A shared handle to an [`Entry`].
///
/// Handles are reference counted; the table keeps one clone per stored entry
/// and the surrounding engine keeps its own. Dropping the table only releases
/// the table's clones, never the entries themselves.
pub type EntryRef<V> = TrioArc<Entry<V>>;

/// A record stored in the index: an immutable key with its precomputed 32-bit
/// hash, a caller-chosen payload, and the next-in-bucket link.
///
/// The key is an arbitrary byte sequence with an explicit length; it is never
/// treated as a NUL-terminated string. The payload `V` is opaque to the
/// table.
///
/// The `next` link is the one field the table owns. It is only ever read or
/// written while the stripe lock of the bucket holding the entry is held,
/// which is what makes the manual `Send`/`Sync` implementations below sound.
pub struct Entry<V> {
    key: Box<[u8]>,
    hash: u32,
    value: V,
    next: UnsafeCell<Option<EntryRef<V>>>,
}

unsafe impl<V: Send + Sync> Send for Entry<V> {}
unsafe impl<V: Send + Sync> Sync for Entry<V> {}

impl<V> Entry<V> {
    /// Creates an entry ready for insertion. `hash` must be the hash of
    /// `key` under the hash function the surrounding engine uses for every
    /// key, or lookups will scan the wrong bucket.
    pub fn new(key: impl Into<Box<[u8]>>, hash: u32, value: V) -> EntryRef<V> {
        TrioArc::new(Self {
            key: key.into(),
            hash,
            value,
            next: UnsafeCell::new(None),
        })
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    /// Pointer to the next-in-bucket link. Dereferencing requires the stripe
    /// lock of the bucket currently holding this entry.
    pub(crate) fn next_ptr(&self) -> *mut Option<EntryRef<V>> {
        self.next.get()
    }

    /// Unlinks and returns this entry's successor.
    ///
    /// # Safety
    ///
    /// The caller must hold the stripe lock of the bucket currently holding
    /// this entry.
    pub(crate) unsafe fn take_next(&self) -> Option<EntryRef<V>> {
        (*self.next.get()).take()
    }
}

impl<V: fmt::Debug> fmt::Debug for Entry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("hash", &self.hash)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::Entry;

    #[test]
    fn accessors() {
        let entry = Entry::new(&b"espresso"[..], 0xdead_beef, 9u64);
        assert_eq!(entry.key(), b"espresso");
        assert_eq!(entry.hash(), 0xdead_beef);
        assert_eq!(*entry.value(), 9);
        assert!(unsafe { entry.take_next() }.is_none());
    }

    #[test]
    fn key_is_compared_by_bytes_not_identity() {
        let a = Entry::new(&b"k\0with-nul"[..], 1, ());
        let b = Entry::new(b"k\0with-nul".to_vec(), 1, ());
        assert_eq!(a.key(), b.key());
    }
}
