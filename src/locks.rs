use crossbeam_utils::CachePadded;
use parking_lot::{Mutex, MutexGuard};

/// The per-bucket lock striping shared by every foreground operation and the
/// migration step of an expansion.
///
/// There are `2^lock_power` stripes, selected by the low bits of whatever
/// index the caller passes (a key hash for foreground operations, an aging
/// bucket index for migration). Because the stripe count divides every live
/// table length, the stripe of an aging bucket equals the stripe of both of
/// its split targets in the doubled array, so migrating one bucket needs
/// exactly one stripe.
///
/// The surrounding cache engine usually owns an instance of this and shares
/// it with the index, so that entry-level operations outside the index
/// serialize with it under the same stripes.
pub struct StripedLocks {
    stripes: Box<[CachePadded<Mutex<()>>]>,
}

impl StripedLocks {
    /// Creates `2^lock_power` stripes, each padded to its own cache line.
    ///
    /// # Panics
    ///
    /// Panics if `lock_power` is 32 or larger.
    pub fn with_power(lock_power: u8) -> Self {
        assert!(lock_power < 32, "lock_power {lock_power} out of range");
        let stripes = (0..1usize << lock_power)
            .map(|_| CachePadded::new(Mutex::new(())))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { stripes }
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    fn stripe(&self, index: usize) -> &Mutex<()> {
        &self.stripes[index & (self.stripes.len() - 1)]
    }

    /// Acquires the stripe covering `index`, blocking until it is free.
    pub fn lock(&self, index: usize) -> MutexGuard<'_, ()> {
        self.stripe(index).lock()
    }

    /// Acquires the stripe covering `index` only if it is uncontended.
    /// Migration uses this so it can back off instead of stalling behind a
    /// foreground operation.
    pub fn try_lock(&self, index: usize) -> Option<MutexGuard<'_, ()>> {
        self.stripe(index).try_lock()
    }
}

#[cfg(test)]
mod tests {
    use super::StripedLocks;

    #[test]
    fn stripe_count_is_a_power_of_two() {
        let locks = StripedLocks::with_power(3);
        assert_eq!(locks.stripe_count(), 8);
    }

    #[test]
    fn indices_wrap_onto_the_same_stripe() {
        let locks = StripedLocks::with_power(2);
        // Index 1 and index 5 share a stripe (5 & 3 == 1), so holding one
        // must make try_lock on the other fail.
        let guard = locks.lock(1);
        assert!(locks.try_lock(5).is_none());
        assert!(locks.try_lock(2).is_some());
        drop(guard);
        assert!(locks.try_lock(5).is_some());
    }
}
