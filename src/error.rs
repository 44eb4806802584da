use std::collections::TryReserveError;

/// The error type for building a [`HashIndex`][hash-index] or growing its
/// bucket array.
///
/// [hash-index]: ./struct.HashIndex.html
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// A bucket array could not be allocated.
    ///
    /// When this happens during a doubling, the table is left exactly as it
    /// was and the maintenance task will retry on the next growth signal.
    /// The load factor may exceed its target until then.
    #[error("failed to allocate a bucket array: {0}")]
    AllocationFailed(#[from] TryReserveError),
}

/// The error type for [`HashIndex::insert`][insert].
///
/// [insert]: ./struct.HashIndex.html#method.insert
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InsertError {
    /// An entry whose key is byte-for-byte equal is already present in the
    /// bucket. The table is unchanged and the rejected entry was not
    /// linked.
    #[error("an entry with an equal key is already in the table")]
    DuplicateKey,
}
