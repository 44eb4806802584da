use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The full-pause barrier over the table state.
///
/// Every foreground operation runs inside a shared guard; the two global
/// steps of an expansion (the array swap and the retirement of the drained
/// aging array) run inside the exclusive guard, which by construction waits
/// until every in-flight foreground operation has left and keeps new ones
/// parked until the structural change is done. This is also what makes
/// retiring the aging array memory-safe: no reader can still hold a
/// reference into it.
///
/// `parking_lot`'s task-fair policy keeps a waiting exclusive acquirer from
/// being starved by a steady stream of foreground readers.
pub(crate) struct Gate<T> {
    inner: RwLock<T>,
}

impl<T> Gate<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
        }
    }

    /// Enters as a foreground worker for the duration of one operation.
    pub(crate) fn enter(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read()
    }

    /// Parks all foreground workers and returns exclusive access. Returning
    /// the guard resumes them.
    pub(crate) fn pause_all(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write()
    }
}

#[cfg(test)]
mod tests {
    use super::Gate;

    #[test]
    fn pause_excludes_workers() {
        let gate = Gate::new(0u32);
        let worker = gate.enter();
        assert!(gate.inner.try_write().is_none());
        drop(worker);

        let mut paused = gate.pause_all();
        *paused += 1;
        assert!(gate.inner.try_read().is_none());
        drop(paused);
        assert_eq!(*gate.enter(), 1);
    }
}
