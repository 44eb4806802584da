//! The background maintenance task driving table expansion.
//!
//! One long-lived thread owns the whole growth protocol: it sleeps on a
//! condvar while the table is idle, wakes when the growth trigger latches a
//! signal, performs the doubling swap under the full pause, then migrates
//! the aging array in `bulk_move` batches, yielding between batches so
//! foreground operations are never starved. Shutdown shares the same
//! condvar, so a stop request cannot be missed.
//!
//! The `state` mutex is the controller lock: it is held for the task's
//! entire active lifetime and released only inside the condvar wait, so
//! `notify_insert` can probe it with a try-lock and skip while the
//! controller is busy.

use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
};

use parking_lot::{Condvar, Mutex};

use crate::table::{expansion::MigrateOutcome, HashIndex, Inner};

#[derive(Default)]
pub(crate) struct TriggerState {
    /// Latched by the growth trigger; consumed by the controller.
    pub(crate) signaled: bool,
    pub(crate) shutdown: bool,
}

pub(crate) struct MaintenanceShared {
    pub(crate) state: Mutex<TriggerState>,
    pub(crate) trigger: Condvar,
}

impl Default for MaintenanceShared {
    fn default() -> Self {
        Self {
            state: Mutex::new(TriggerState::default()),
            trigger: Condvar::new(),
        }
    }
}

/// Handle to the running maintenance task of a [`HashIndex`][hash-index].
///
/// Dropping the handle (or calling [`stop`][stop]) requests a cooperative
/// shutdown and joins the thread. There is no mid-migration cancellation:
/// an in-progress expansion is driven to completion before the task
/// observes the request, because the controller lock is released only while
/// the task is idle. A table left mid-expansion by some other means stays
/// fully usable, and a newly started maintainer picks the migration up at
/// the cursor.
///
/// [hash-index]: ./struct.HashIndex.html
/// [stop]: #method.stop
pub struct Maintainer {
    shared: Arc<MaintenanceShared>,
    thread: Option<JoinHandle<()>>,
}

impl Maintainer {
    /// Spawns the maintenance thread for `index`.
    ///
    /// The controller lock serializes maintenance work, so even if more
    /// than one task is started on the same index, at most one is ever
    /// active.
    pub fn start<V>(index: &HashIndex<V>) -> io::Result<Self>
    where
        V: Send + Sync + 'static,
    {
        let inner = Arc::clone(&index.inner);
        let shared = Arc::clone(&inner.maint);
        let thread = thread::Builder::new()
            .name("rehash-maintenance".into())
            .spawn(move || run(&inner))?;
        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// Requests shutdown and waits for the thread to exit.
    pub fn stop(mut self) {
        self.shut_down();
    }

    fn shut_down(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.shared.state.lock().shutdown = true;
            self.shared.trigger.notify_one();
            let _ = thread.join();
        }
    }
}

impl Drop for Maintainer {
    fn drop(&mut self) {
        self.shut_down();
    }
}

fn run<V>(inner: &Inner<V>) {
    let shared = &inner.maint;
    let mut state = shared.state.lock();

    while !state.shutdown {
        // Migrate up to bulk_move buckets this turn.
        for _ in 0..inner.config.bulk_move {
            match inner.migrate_one_bucket() {
                MigrateOutcome::Migrated => {}
                MigrateOutcome::Contended => {
                    // A foreground operation holds the bucket; back off and
                    // let it finish rather than spinning on the stripe.
                    thread::sleep(inner.config.migration_backoff);
                    break;
                }
                MigrateOutcome::Finished => {
                    inner.finish_expansion();
                    break;
                }
                MigrateOutcome::Idle => break,
            }
        }

        if inner.is_expanding() {
            thread::yield_now();
            continue;
        }

        // Idle: suspend until the growth trigger or a shutdown request
        // fires. Both share this condvar.
        while !state.signaled && !state.shutdown {
            shared.trigger.wait(&mut state);
        }
        if state.shutdown {
            break;
        }
        state.signaled = false;

        if let Err(e) = inner.start_expansion() {
            // Resource exhaustion, not a logic error: keep the table as it
            // is and wait for a later signal to retry.
            log::warn!("hash table expansion skipped: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Maintainer;
    use crate::{config::Config, entry::Entry, table::HashIndex};
    use std::time::{Duration, Instant};

    fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !done() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn test_index(initial_hashpower: u8) -> HashIndex<u64> {
        HashIndex::new(Config {
            initial_hashpower,
            max_hashpower: 8,
            lock_power: 1,
            migration_backoff: Duration::from_millis(1),
            ..Config::default()
        })
        .unwrap()
    }

    #[test]
    fn starts_and_stops_without_a_trigger() {
        let index = test_index(2);
        let maintainer = Maintainer::start(&index).unwrap();
        maintainer.stop();
    }

    #[test]
    fn drop_also_stops_the_task() {
        let index = test_index(2);
        let _ = Maintainer::start(&index).unwrap();
    }

    #[test]
    fn trigger_drives_a_background_doubling() {
        let index = test_index(2);
        let maintainer = Maintainer::start(&index).unwrap();

        for i in 0u64..7 {
            let key = format!("key-{i}").into_bytes();
            index.insert(Entry::new(key, i as u32, i)).unwrap();
            index.notify_insert(i + 1);
        }

        // Keep nudging the trigger the way a busy engine would; the first
        // signal can race the task's startup.
        wait_until("the table to double", || {
            index.notify_insert(7);
            index.hashpower() == 3
        });
        wait_until("migration to finish", || !index.is_expanding());

        for i in 0u64..7 {
            let key = format!("key-{i}").into_bytes();
            assert_eq!(*index.find(&key, i as u32).unwrap().value(), i);
        }
        maintainer.stop();
    }

    // A maintainer started while an expansion is already mid-migration must
    // pick it up and finish it, even with no growth signal pending.
    #[test]
    fn resumes_a_partial_migration() {
        let index = test_index(3);
        for i in 0u64..12 {
            let key = format!("key-{i}").into_bytes();
            index.insert(Entry::new(key, i as u32, i)).unwrap();
        }
        index.inner.start_expansion().unwrap();
        assert!(index.is_expanding());

        let maintainer = Maintainer::start(&index).unwrap();
        wait_until("migration to finish", || !index.is_expanding());
        maintainer.stop();

        assert_eq!(index.hashpower(), 4);
        for i in 0u64..12 {
            let key = format!("key-{i}").into_bytes();
            assert_eq!(*index.find(&key, i as u32).unwrap().value(), i);
        }
    }
}
