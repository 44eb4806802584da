#![warn(clippy::all)]
#![warn(rust_2018_idioms)]

//! An incrementally-resizing concurrent hash index for in-memory caches.
//!
//! `rehash` is the key-indexing layer of a key/value cache engine: given a
//! key and its precomputed 32-bit hash, it locates the stored entry in O(1)
//! expected time, while the table grows to follow an unbounded entry
//! population without ever stalling the whole service for a full rehash.
//!
//! The table is a classic chained design (a power-of-two bucket array with
//! singly-linked collision chains under per-bucket lock striping) with one
//! twist: doubling happens *incrementally*. When the load factor passes
//! 3/2, a background maintenance task allocates the doubled array, swaps it
//! in during one brief full pause, and then drains the old array one bucket
//! at a time while foreground readers and writers keep running. Buckets not
//! yet migrated are transparently served from the old generation, so
//! expansion is invisible to correctness and costs foreground threads only
//! the occasional lost bucket-lock race.
//!
//! What this crate is *not*: a general-purpose hash map. There is no
//! iteration, no shrinking, and no upsert; values live in caller-owned
//! [`Entry`] records the index never copies. The surrounding engine owns
//! hashing, the entry allocator, the item count, and eviction.
//!
//! # Example
//!
//! ```rust
//! use rehash::{Config, Entry, HashIndex, Maintainer};
//!
//! let index = HashIndex::new(Config::load())?;
//! let maintainer = Maintainer::start(&index)?;
//!
//! // The engine hashes keys; any 32-bit hash function works.
//! let (key, hash) = (b"user:1042", 0x5eed_cafe_u32);
//!
//! index.insert(Entry::new(&key[..], hash, "value bytes live elsewhere"))?;
//! index.notify_insert(1); // engine-maintained item count
//!
//! let entry = index.find(key, hash).expect("just inserted");
//! assert_eq!(entry.key(), key);
//!
//! let _ = index.remove(key, hash);
//! maintainer.stop();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod entry;
mod error;
mod gate;
mod locks;
mod maintenance;
mod stats;
mod table;

pub use config::{Config, BULK_MOVE_ENV};
pub use entry::{Entry, EntryRef};
pub use error::{IndexError, InsertError};
pub use locks::StripedLocks;
pub use maintenance::Maintainer;
pub use stats::{AtomicStats, DisabledStatsSink, StatsSink, StatsSnapshot};
pub use table::HashIndex;
