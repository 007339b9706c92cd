//! multikey-map: a single-threaded map keyed by `(major, minor)` pairs,
//! with pooled inner tables and fail-fast cursors.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: answer "everything under this major key" in O(1) plus output,
//!   and "everything under this minor key" in one pass over major keys,
//!   without giving up O(1) average point lookups.
//! - Layers:
//!   - DenseTable<K, V>: hash index over a dense entry vector; every
//!     entry keeps the hash computed at insertion. Used at both levels.
//!   - MultiKeyMap<M, N, V, CM, CN, CV>: outer DenseTable from major key
//!     to an inner DenseTable from minor key to value, a pool of emptied
//!     inner tables, a total count and a mutation version.
//!   - Iterators, cursors and views: read paths over the two levels.
//!
//! Constraints
//! - Single-threaded: `!Sync` via the reentrancy tracker's marker.
//! - A major key is present iff its inner table is non-empty. Draining an
//!   inner table detaches it and queues it in the pool; the next new
//!   major key takes a table from the pool before allocating.
//! - Duplicate composite keys fail on `insert`; `set` overwrites.
//! - Key identity comes from the comparer type parameters, not from the
//!   key types alone.
//!
//! Enumeration
//! - Borrowing iterators (`iter`, `iter_major`, `iter_minor`, `keys`,
//!   `values`) hold a borrow of the map, so the borrow checker rules out
//!   mutation while they live.
//! - Cursors (`cursor`, `cursor_with_major_key`, `cursor_with_minor_key`,
//!   view cursors) hold positions and the version they were created at.
//!   Each `advance(&map)` compares versions and fails with
//!   `MapError::Modified` if the map changed structurally in between.
//!
//! Version semantics
//! - Bumped by every successful insert, removal, clear, and by `set`
//!   overwriting an existing value. Queries, misses, duplicate inserts
//!   and in-place edits through `get_mut`/`iter_mut` leave it alone.
//!
//! Reentrancy policy
//! - Entry points that call comparers hold a debug-only reentrancy
//!   guard; a comparer that calls back into the same map panics in
//!   debug builds. Release builds compile the guard away.
//!
//! Hasher and rehashing invariants
//! - Each entry stores its hash and the index always rehashes from the
//!   stored value, so comparers run only at lookup and insert time.
//!
//! Notes and non-goals
//! - No ordering of keys; iteration order is unspecified.
//! - No reverse index from minor key to major keys.
//! - No thread safety and no serialization.

pub mod comparer;
pub mod cursor;
mod dense_table;
pub mod error;
pub mod iter;
pub mod key;
mod multi_key_map;
mod multi_key_map_proptest;
mod reentrancy;
pub mod views;

// Public surface
pub use comparer::{FnComparer, HashComparer, KeyComparer, PartialEqComparer, ValueComparer};
pub use cursor::{Cursor, KeyCursor, MajorKeyValueCursor, MinorKeyValueCursor, ValueCursor};
pub use error::{MapError, Result};
pub use key::CompositeKey;
pub use multi_key_map::MultiKeyMap;
pub use views::{Collection, KeyCollection, ValueCollection};
