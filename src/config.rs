use std::time::Duration;

pub(crate) const DEFAULT_HASHPOWER: u8 = 16;
pub(crate) const DEFAULT_MAX_HASHPOWER: u8 = 32;
pub(crate) const DEFAULT_BULK_MOVE: usize = 1;
pub(crate) const DEFAULT_MIGRATION_BACKOFF: Duration = Duration::from_millis(10);
pub(crate) const DEFAULT_LOCK_POWER: u8 = 10;

// Bucket indices are the low bits of a 32-bit hash, so a larger table has
// buckets no key can ever reach.
pub(crate) const HASHPOWER_LIMIT: u8 = 32;

/// Name of the environment variable that overrides [`Config::bulk_move`].
pub const BULK_MOVE_ENV: &str = "REHASH_BULK_MOVE";

/// Tunables for a [`HashIndex`][hash-index], read once at startup.
///
/// [hash-index]: ./struct.HashIndex.html
#[derive(Clone, Debug)]
pub struct Config {
    /// The table starts with `2^initial_hashpower` buckets.
    /// Default: 16 (65,536 buckets).
    pub initial_hashpower: u8,
    /// Growth ceiling; the table never doubles beyond `2^max_hashpower`
    /// buckets. Bounds the worst-case memory commitment of the index.
    /// Default: 32.
    pub max_hashpower: u8,
    /// How many buckets the maintenance task migrates per scheduling turn
    /// before yielding to foreground operations. Default: 1.
    pub bulk_move: usize,
    /// How long the maintenance task sleeps after losing a bucket-lock race
    /// during migration. Only forward progress matters for correctness; this
    /// is policy. Default: 10 ms.
    pub migration_backoff: Duration,
    /// The lock table built by [`HashIndex::new`][new] has `2^lock_power`
    /// stripes. Clamped to `initial_hashpower` so one stripe always covers
    /// the same physical entries in both live arrays during migration.
    /// Ignored when the caller supplies its own stripes. Default: 10.
    ///
    /// [new]: ./struct.HashIndex.html#method.new
    pub lock_power: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_hashpower: DEFAULT_HASHPOWER,
            max_hashpower: DEFAULT_MAX_HASHPOWER,
            bulk_move: DEFAULT_BULK_MOVE,
            migration_backoff: DEFAULT_MIGRATION_BACKOFF,
            lock_power: DEFAULT_LOCK_POWER,
        }
    }
}

impl Config {
    /// Returns the default configuration with environment overrides applied.
    ///
    /// Currently only `REHASH_BULK_MOVE` is honored. Unparseable or zero
    /// values are ignored with a warning, keeping the default.
    pub fn load() -> Self {
        Self::default().overridden_from_env()
    }

    pub(crate) fn overridden_from_env(mut self) -> Self {
        if let Ok(raw) = std::env::var(BULK_MOVE_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.bulk_move = n,
                _ => log::warn!("ignoring {BULK_MOVE_ENV}={raw:?}: expected a positive integer"),
            }
        }
        self
    }

    /// Clamps the fields into ranges the table can actually run with.
    pub(crate) fn normalized(mut self) -> Self {
        self.initial_hashpower = self.initial_hashpower.clamp(1, HASHPOWER_LIMIT);
        self.max_hashpower = self
            .max_hashpower
            .clamp(self.initial_hashpower, HASHPOWER_LIMIT);
        self.lock_power = self.lock_power.min(self.initial_hashpower);
        self.bulk_move = self.bulk_move.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.initial_hashpower, 16);
        assert_eq!(config.max_hashpower, 32);
        assert_eq!(config.bulk_move, 1);
        assert_eq!(config.migration_backoff, Duration::from_millis(10));
    }

    #[test]
    fn normalized_clamps_degenerate_values() {
        let config = Config {
            initial_hashpower: 0,
            max_hashpower: 0,
            bulk_move: 0,
            lock_power: 20,
            ..Config::default()
        }
        .normalized();
        assert_eq!(config.initial_hashpower, 1);
        assert_eq!(config.max_hashpower, 1);
        assert_eq!(config.bulk_move, 1);
        assert_eq!(config.lock_power, 1);

        let config = Config {
            initial_hashpower: 40,
            max_hashpower: 48,
            ..Config::default()
        }
        .normalized();
        assert_eq!(config.initial_hashpower, HASHPOWER_LIMIT);
        assert_eq!(config.max_hashpower, HASHPOWER_LIMIT);
    }

    // Env-var cases run in one test because the process environment is
    // shared between test threads.
    #[test]
    fn bulk_move_env_override() {
        std::env::set_var(BULK_MOVE_ENV, "8");
        assert_eq!(Config::load().bulk_move, 8);

        std::env::set_var(BULK_MOVE_ENV, "0");
        assert_eq!(Config::load().bulk_move, DEFAULT_BULK_MOVE);

        std::env::set_var(BULK_MOVE_ENV, "not-a-number");
        assert_eq!(Config::load().bulk_move, DEFAULT_BULK_MOVE);

        std::env::remove_var(BULK_MOVE_ENV);
        assert_eq!(Config::load().bulk_move, DEFAULT_BULK_MOVE);
    }
}
