//! MultiKeyMap: two-level map with pooled inner tables and a mutation version.

use crate::comparer::{HashComparer, KeyComparer, PartialEqComparer, ValueComparer};
use crate::cursor::{Cursor, MajorKeyValueCursor, MinorKeyValueCursor};
use crate::dense_table::DenseTable;
use crate::error::{MapError, Result};
use crate::iter::{Iter, IterMut};
use crate::key::CompositeKey;
use crate::reentrancy::DebugReentrancy;
use crate::views::{KeyCollection, ValueCollection};
use core::borrow::Borrow;
use core::hash::Hash;
use std::collections::VecDeque;

/// How the shared insert routine treats an existing composite key.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum InsertMode {
    MustBeNew,
    Overwrite,
}

/// Inner tables are `DenseTable<N, V>`; the outer table maps each major
/// key to its inner table by value.
pub(crate) type InnerTable<N, V> = DenseTable<N, V>;

/// A map keyed by `(major, minor)` pairs.
///
/// Layout: an outer table from major key to an inner table from minor key
/// to value. Inner tables that drain to zero entries are detached and
/// queued in a pool, and the next major key that needs a table takes one
/// from the pool before allocating.
///
/// Invariants:
/// - every inner table reachable from a major key is non-empty;
/// - `len()` equals the sum of inner-table sizes;
/// - pooled tables are empty and unreachable;
/// - `version()` increases on every structural mutation and on upserts,
///   and nowhere else.
///
/// Values can be enumerated through borrowing iterators (`iter`,
/// `iter_major`, `iter_minor`, `keys`, `values`) or through detached
/// cursors that fail with [`MapError::Modified`] once the map changes
/// under them.
pub struct MultiKeyMap<M, N, V, CM = HashComparer, CN = HashComparer, CV = PartialEqComparer> {
    pub(crate) outer: DenseTable<M, InnerTable<N, V>>,
    pool: VecDeque<InnerTable<N, V>>,
    len: usize,
    pub(crate) version: u64,
    pub(crate) major_comparer: CM,
    pub(crate) minor_comparer: CN,
    value_comparer: CV,
    pub(crate) reentrancy: DebugReentrancy,
}

impl<M, N, V> MultiKeyMap<M, N, V>
where
    M: Eq + Hash,
    N: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// `capacity` sizes the outer table, i.e. the expected number of
    /// distinct major keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_comparers(
            capacity,
            HashComparer::new(),
            HashComparer::new(),
            PartialEqComparer,
        )
    }

    /// Build from `((major, minor), value)` pairs, inserting each as if by
    /// [`insert`](Self::insert).
    pub fn try_from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = ((M, N), V)>,
    {
        Self::try_from_pairs_with(
            0,
            pairs,
            HashComparer::new(),
            HashComparer::new(),
            PartialEqComparer,
        )
    }
}

impl<M, N, V, CM, CN, CV> Default for MultiKeyMap<M, N, V, CM, CN, CV>
where
    CM: Default,
    CN: Default,
    CV: Default,
{
    fn default() -> Self {
        Self::with_comparers(0, CM::default(), CN::default(), CV::default())
    }
}

// Construction, sizes and iteration need no comparer.
impl<M, N, V, CM, CN, CV> MultiKeyMap<M, N, V, CM, CN, CV> {
    pub fn with_comparers(
        capacity: usize,
        major_comparer: CM,
        minor_comparer: CN,
        value_comparer: CV,
    ) -> Self {
        Self {
            outer: DenseTable::with_capacity(capacity),
            pool: VecDeque::new(),
            len: 0,
            version: 0,
            major_comparer,
            minor_comparer,
            value_comparer,
            reentrancy: DebugReentrancy::new(),
        }
    }

    /// Number of composite keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct major keys. Never counts a major key without
    /// minor keys.
    #[inline]
    pub fn major_key_count(&self) -> usize {
        self.outer.len()
    }

    /// Mutation counter captured by cursors.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of emptied inner tables waiting for reuse.
    #[inline]
    pub fn pooled_tables(&self) -> usize {
        self.pool.len()
    }

    /// Free the pooled inner tables. Not a structural mutation.
    pub fn release_pooled_tables(&mut self) {
        self.pool.clear();
        self.pool.shrink_to_fit();
    }

    pub fn major_comparer(&self) -> &CM {
        &self.major_comparer
    }

    pub fn minor_comparer(&self) -> &CN {
        &self.minor_comparer
    }

    pub fn value_comparer(&self) -> &CV {
        &self.value_comparer
    }

    /// Every `(major, minor, value)` triple, flattened across major keys.
    pub fn iter(&self) -> Iter<'_, M, N, V> {
        Iter::new(self.outer.entries(), self.len)
    }

    /// Like [`iter`](Self::iter) with mutable values. Editing a value in
    /// place is not a structural mutation.
    pub fn iter_mut(&mut self) -> IterMut<'_, M, N, V> {
        IterMut::new(self.outer.entries_mut(), self.len)
    }

    pub fn major_keys(&self) -> impl Iterator<Item = &M> {
        self.outer.iter().map(|(m, _)| m)
    }

    /// Read-only view of every composite key.
    pub fn keys(&self) -> KeyCollection<'_, M, N, V, CM, CN, CV> {
        KeyCollection::new(self)
    }

    /// Read-only view of every value.
    pub fn values(&self) -> ValueCollection<'_, M, N, V, CM, CN, CV> {
        ValueCollection::new(self)
    }

    /// Detached full-traversal cursor. See [`Cursor`].
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.version)
    }

    /// Detached cursor over the `(major, value)` pairs stored under `minor`.
    pub fn cursor_with_minor_key(&self, minor: N) -> MajorKeyValueCursor<N> {
        MajorKeyValueCursor::new(self.cursor(), minor)
    }

    pub(crate) fn check_version(&self, captured: u64) -> Result<()> {
        if captured == self.version {
            Ok(())
        } else {
            Err(MapError::Modified)
        }
    }

    /// Re-check the structural invariants and both table indexes.
    #[doc(hidden)]
    pub fn validate(&self) -> Result<()> {
        self.outer.validate()?;
        let mut total = 0;
        for table in self.outer.values() {
            if table.is_empty() {
                return Err(MapError::InvariantViolated("reachable inner table is empty"));
            }
            table.validate()?;
            total += table.len();
        }
        if total != self.len {
            return Err(MapError::InvariantViolated("len disagrees with inner tables"));
        }
        if self.pool.iter().any(|t| !t.is_empty()) {
            return Err(MapError::InvariantViolated("pooled inner table is not empty"));
        }
        Ok(())
    }
}

/// Detach the inner table at `slot`, empty it into `pool` and return how
/// many entries it held.
///
/// Takes the fields rather than the map so callers can hold the
/// reentrancy guard across it.
fn detach<M, N, V>(
    outer: &mut DenseTable<M, InnerTable<N, V>>,
    pool: &mut VecDeque<InnerTable<N, V>>,
    slot: usize,
) -> usize {
    let (_major, mut table) = outer.remove_at(slot);
    let removed = table.len();
    table.clear();
    pool.push_back(table);
    removed
}

impl<M, N, V, CM, CN, CV> MultiKeyMap<M, N, V, CM, CN, CV>
where
    CM: KeyComparer<M>,
    CN: KeyComparer<N>,
{
    /// Build from `((major, minor), value)` pairs under the given comparers.
    /// The first duplicate composite key aborts with
    /// [`MapError::DuplicateKey`].
    pub fn try_from_pairs_with<I>(
        capacity: usize,
        pairs: I,
        major_comparer: CM,
        minor_comparer: CN,
        value_comparer: CV,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = ((M, N), V)>,
    {
        let mut map = Self::with_comparers(capacity, major_comparer, minor_comparer, value_comparer);
        for ((major, minor), value) in pairs {
            map.insert(major, minor, value)?;
        }
        Ok(map)
    }

    /// Re-index another map under these comparers.
    ///
    /// The outer table is sized by the source's major key count rather
    /// than its total length. Comparers coarser than the source's can
    /// make two source keys collide; that reports
    /// [`MapError::DuplicateKey`].
    pub fn try_from_map<CM2, CN2, CV2>(
        source: &MultiKeyMap<M, N, V, CM2, CN2, CV2>,
        major_comparer: CM,
        minor_comparer: CN,
        value_comparer: CV,
    ) -> Result<Self>
    where
        M: Clone,
        N: Clone,
        V: Clone,
    {
        Self::try_from_pairs_with(
            source.major_key_count(),
            source
                .iter()
                .map(|(m, n, v)| ((m.clone(), n.clone()), v.clone())),
            major_comparer,
            minor_comparer,
            value_comparer,
        )
    }

    /// Add a value under a new composite key. An existing key is left
    /// untouched and reported as [`MapError::DuplicateKey`].
    pub fn insert(&mut self, major: M, minor: N, value: V) -> Result<()> {
        self.insert_entry(major, minor, || value, InsertMode::MustBeNew)
            .map(|_| ())
    }

    /// Like [`insert`](Self::insert), but `make` only runs when the key
    /// is new.
    pub fn insert_with<F>(&mut self, major: M, minor: N, make: F) -> Result<()>
    where
        F: FnOnce() -> V,
    {
        self.insert_entry(major, minor, make, InsertMode::MustBeNew)
            .map(|_| ())
    }

    /// Upsert. Returns the replaced value, if any.
    pub fn set(&mut self, major: M, minor: N, value: V) -> Option<V> {
        match self.insert_entry(major, minor, || value, InsertMode::Overwrite) {
            Ok(previous) => previous,
            // Overwrite never reports a duplicate.
            Err(_) => None,
        }
    }

    pub fn insert_key(&mut self, key: CompositeKey<M, N>, value: V) -> Result<()> {
        let (major, minor) = key.into_parts();
        self.insert(major, minor, value)
    }

    fn insert_entry<F>(&mut self, major: M, minor: N, make: F, mode: InsertMode) -> Result<Option<V>>
    where
        F: FnOnce() -> V,
    {
        let _g = self.reentrancy.enter();
        let major_hash = self.major_comparer.hash(&major);
        let minor_hash = self.minor_comparer.hash(&minor);

        match self.outer.find_hashed(&self.major_comparer, major_hash, &major) {
            Some(slot) => {
                let table = self.outer.value_at_mut(slot);
                // Existing minor key: the table size cannot change.
                if let Some(pos) = table.find_hashed(&self.minor_comparer, minor_hash, &minor) {
                    return match mode {
                        InsertMode::MustBeNew => Err(MapError::DuplicateKey),
                        InsertMode::Overwrite => {
                            let previous = core::mem::replace(table.value_at_mut(pos), make());
                            self.version += 1;
                            Ok(Some(previous))
                        }
                    };
                }
                table.push_unique(minor_hash, minor, make());
            }
            None => {
                // A fresh table cannot hold a duplicate, so it is only
                // attached once it has its first entry.
                let mut table = self.pool.pop_front().unwrap_or_default();
                table.push_unique(minor_hash, minor, make());
                self.outer.push_unique(major_hash, major, table);
            }
        }

        self.len += 1;
        self.version += 1;
        Ok(None)
    }
}

// Lookups, removal and queries accept borrowed forms of both keys.
impl<M, N, V, CM, CN, CV> MultiKeyMap<M, N, V, CM, CN, CV> {
    /// Value under `(major, minor)`, if any.
    pub fn get<QM, QN>(&self, major: &QM, minor: &QN) -> Option<&V>
    where
        M: Borrow<QM>,
        N: Borrow<QN>,
        QM: ?Sized,
        QN: ?Sized,
        CM: KeyComparer<QM>,
        CN: KeyComparer<QN>,
    {
        let _g = self.reentrancy.enter();
        self.lookup(major, minor)
    }

    /// Strict lookup: a missing key is [`MapError::KeyNotFound`].
    pub fn value<QM, QN>(&self, major: &QM, minor: &QN) -> Result<&V>
    where
        M: Borrow<QM>,
        N: Borrow<QN>,
        QM: ?Sized,
        QN: ?Sized,
        CM: KeyComparer<QM>,
        CN: KeyComparer<QN>,
    {
        let _g = self.reentrancy.enter();
        self.lookup(major, minor).ok_or(MapError::KeyNotFound)
    }

    pub fn get_mut<QM, QN>(&mut self, major: &QM, minor: &QN) -> Option<&mut V>
    where
        M: Borrow<QM>,
        N: Borrow<QN>,
        QM: ?Sized,
        QN: ?Sized,
        CM: KeyComparer<QM>,
        CN: KeyComparer<QN>,
    {
        let _g = self.reentrancy.enter();
        let slot = self.outer.find(&self.major_comparer, major)?;
        self.outer
            .value_at_mut(slot)
            .get_mut(&self.minor_comparer, minor)
    }

    pub fn get_key(&self, key: &CompositeKey<M, N>) -> Option<&V>
    where
        CM: KeyComparer<M>,
        CN: KeyComparer<N>,
    {
        self.get(&key.major, &key.minor)
    }

    pub fn contains(&self, key: &CompositeKey<M, N>) -> bool
    where
        CM: KeyComparer<M>,
        CN: KeyComparer<N>,
    {
        self.contains_key(&key.major, &key.minor)
    }

    pub fn contains_key<QM, QN>(&self, major: &QM, minor: &QN) -> bool
    where
        M: Borrow<QM>,
        N: Borrow<QN>,
        QM: ?Sized,
        QN: ?Sized,
        CM: KeyComparer<QM>,
        CN: KeyComparer<QN>,
    {
        let _g = self.reentrancy.enter();
        self.lookup(major, minor).is_some()
    }

    pub fn contains_major_key<QM>(&self, major: &QM) -> bool
    where
        M: Borrow<QM>,
        QM: ?Sized,
        CM: KeyComparer<QM>,
    {
        let _g = self.reentrancy.enter();
        self.outer.find(&self.major_comparer, major).is_some()
    }

    /// Whether any major key holds `minor`. Scans every major key.
    pub fn contains_minor_key<QN>(&self, minor: &QN) -> bool
    where
        N: Borrow<QN>,
        QN: ?Sized,
        CN: KeyComparer<QN>,
    {
        let _g = self.reentrancy.enter();
        let hash = self.minor_comparer.hash(minor);
        self.outer
            .values()
            .any(|t| t.find_hashed(&self.minor_comparer, hash, minor).is_some())
    }

    /// Linear scan with the value comparer; stops at the first match.
    pub fn contains_value(&self, value: &V) -> bool
    where
        CV: ValueComparer<V>,
    {
        let _g = self.reentrancy.enter();
        self.outer
            .values()
            .flat_map(|t| t.values())
            .any(|v| self.value_comparer.eq(v, value))
    }

    /// Number of minor keys under `major`; 0 when absent.
    pub fn minor_key_count<QM>(&self, major: &QM) -> usize
    where
        M: Borrow<QM>,
        QM: ?Sized,
        CM: KeyComparer<QM>,
    {
        let _g = self.reentrancy.enter();
        self.outer
            .get(&self.major_comparer, major)
            .map_or(0, |t| t.len())
    }

    /// Number of major keys holding `minor`. Scans every major key.
    pub fn major_key_count_for<QN>(&self, minor: &QN) -> usize
    where
        N: Borrow<QN>,
        QN: ?Sized,
        CN: KeyComparer<QN>,
    {
        let _g = self.reentrancy.enter();
        let hash = self.minor_comparer.hash(minor);
        self.outer
            .values()
            .filter(|t| t.find_hashed(&self.minor_comparer, hash, minor).is_some())
            .count()
    }

    /// Append every entry under `major` to `out`, allocating the vector
    /// only when there is something to append. Returns whether anything
    /// matched; on a miss `out` is left as it was.
    pub fn query_values_with_major_key<'a, QM>(
        &'a self,
        major: &QM,
        out: &mut Option<Vec<(&'a M, &'a N, &'a V)>>,
    ) -> bool
    where
        M: Borrow<QM>,
        QM: ?Sized,
        CM: KeyComparer<QM>,
    {
        let _g = self.reentrancy.enter();
        let Some(slot) = self.outer.find(&self.major_comparer, major) else {
            return false;
        };
        let entry = &self.outer.entries()[slot];
        let table = &entry.value;
        let dest = out.get_or_insert_with(|| Vec::with_capacity(table.len()));
        dest.extend(table.iter().map(|(n, v)| (&entry.key, n, v)));
        true
    }

    /// Append every entry stored under `minor`, across all major keys.
    /// Same allocation and miss policy as
    /// [`query_values_with_major_key`](Self::query_values_with_major_key).
    pub fn query_values_with_minor_key<'a, QN>(
        &'a self,
        minor: &QN,
        out: &mut Option<Vec<(&'a M, &'a N, &'a V)>>,
    ) -> bool
    where
        N: Borrow<QN>,
        QN: ?Sized,
        CN: KeyComparer<QN>,
    {
        let _g = self.reentrancy.enter();
        let hash = self.minor_comparer.hash(minor);
        let mut found = false;
        for entry in self.outer.entries() {
            let table = &entry.value;
            if let Some(pos) = table.find_hashed(&self.minor_comparer, hash, minor) {
                let e = &table.entries()[pos];
                out.get_or_insert_with(Vec::new)
                    .push((&entry.key, &e.key, &e.value));
                found = true;
            }
        }
        found
    }

    /// Entries under one major key.
    pub fn iter_major<QM>(&self, major: &QM) -> impl Iterator<Item = (&N, &V)>
    where
        M: Borrow<QM>,
        QM: ?Sized,
        CM: KeyComparer<QM>,
    {
        let _g = self.reentrancy.enter();
        self.outer
            .get(&self.major_comparer, major)
            .into_iter()
            .flat_map(|t| t.iter())
    }

    /// `(major, value)` pairs stored under one minor key.
    pub fn iter_minor<'a, QN>(&'a self, minor: &'a QN) -> impl Iterator<Item = (&'a M, &'a V)> + 'a
    where
        N: Borrow<QN>,
        QN: ?Sized,
        CN: KeyComparer<QN>,
    {
        let hash = self.minor_comparer.hash(minor);
        self.outer.iter().filter_map(move |(m, t)| {
            t.find_hashed(&self.minor_comparer, hash, minor)
                .map(|pos| (m, &t.entries()[pos].value))
        })
    }

    /// Detached cursor over the `(minor, value)` pairs under `major`.
    pub fn cursor_with_major_key(&self, major: M) -> MinorKeyValueCursor<M>
    where
        CM: KeyComparer<M>,
    {
        let _g = self.reentrancy.enter();
        MinorKeyValueCursor::new(self, major)
    }

    /// Remove `(major, minor)`, returning its value. A drained major key is
    /// detached and its table pooled.
    pub fn remove<QM, QN>(&mut self, major: &QM, minor: &QN) -> Option<V>
    where
        M: Borrow<QM>,
        N: Borrow<QN>,
        QM: ?Sized,
        QN: ?Sized,
        CM: KeyComparer<QM>,
        CN: KeyComparer<QN>,
    {
        let _g = self.reentrancy.enter();
        let slot = self.outer.find(&self.major_comparer, major)?;
        let table = self.outer.value_at_mut(slot);
        let (_minor, value) = table.remove(&self.minor_comparer, minor)?;
        let drained = table.is_empty();

        self.len -= 1;
        self.version += 1;
        if drained {
            detach(&mut self.outer, &mut self.pool, slot);
        }
        Some(value)
    }

    pub fn remove_key(&mut self, key: &CompositeKey<M, N>) -> Option<V>
    where
        CM: KeyComparer<M>,
        CN: KeyComparer<N>,
    {
        self.remove(&key.major, &key.minor)
    }

    /// Empty every inner table into the pool.
    pub fn clear(&mut self) {
        let _g = self.reentrancy.enter();
        while !self.outer.is_empty() {
            let last = self.outer.len() - 1;
            detach(&mut self.outer, &mut self.pool, last);
        }
        self.len = 0;
        self.version += 1;
    }

    /// Drop every entry under `major`. Returns how many were removed; an
    /// absent major key is a no-op that leaves the version alone.
    pub fn clear_major_key<QM>(&mut self, major: &QM) -> usize
    where
        M: Borrow<QM>,
        QM: ?Sized,
        CM: KeyComparer<QM>,
    {
        let _g = self.reentrancy.enter();
        let Some(slot) = self.outer.find(&self.major_comparer, major) else {
            return 0;
        };
        let removed = detach(&mut self.outer, &mut self.pool, slot);
        self.len -= removed;
        self.version += 1;
        removed
    }

    /// Drop `minor` from every major key, pooling the tables it drains.
    /// Scans every major key; there is no reverse index. Returns how many
    /// entries were removed.
    pub fn clear_minor_key<QN>(&mut self, minor: &QN) -> usize
    where
        N: Borrow<QN>,
        QN: ?Sized,
        CN: KeyComparer<QN>,
    {
        let _g = self.reentrancy.enter();
        let hash = self.minor_comparer.hash(minor);
        let mut removed = 0;
        let mut drained = Vec::new();
        for (slot, table) in self.outer.values_mut().enumerate() {
            if let Some(pos) = table.find_hashed(&self.minor_comparer, hash, minor) {
                let _ = table.remove_at(pos);
                removed += 1;
                if table.is_empty() {
                    drained.push(slot);
                }
            }
        }
        // Highest slot first: swap_remove only moves entries from above.
        for &slot in drained.iter().rev() {
            detach(&mut self.outer, &mut self.pool, slot);
        }
        if removed > 0 {
            self.len -= removed;
            self.version += 1;
        }
        removed
    }

    fn lookup<QM, QN>(&self, major: &QM, minor: &QN) -> Option<&V>
    where
        M: Borrow<QM>,
        N: Borrow<QN>,
        QM: ?Sized,
        QN: ?Sized,
        CM: KeyComparer<QM>,
        CN: KeyComparer<QN>,
    {
        self.outer
            .get(&self.major_comparer, major)?
            .get(&self.minor_comparer, minor)
    }
}

impl<M, N, V, CM, CN, CV> Clone for MultiKeyMap<M, N, V, CM, CN, CV>
where
    M: Clone,
    N: Clone,
    V: Clone,
    CM: Clone,
    CN: Clone,
    CV: Clone,
{
    /// Copies the entries and comparers. The pool is not copied and the
    /// clone starts at version 0.
    fn clone(&self) -> Self {
        Self {
            outer: self.outer.clone(),
            pool: VecDeque::new(),
            len: self.len,
            version: 0,
            major_comparer: self.major_comparer.clone(),
            minor_comparer: self.minor_comparer.clone(),
            value_comparer: self.value_comparer.clone(),
            reentrancy: DebugReentrancy::new(),
        }
    }
}

impl<M, N, V, CM, CN, CV> core::fmt::Debug for MultiKeyMap<M, N, V, CM, CN, CV>
where
    M: core::fmt::Debug,
    N: core::fmt::Debug,
    V: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(m, n, v)| ((m, n), v)))
            .finish()
    }
}

impl<'a, M, N, V, CM, CN, CV> IntoIterator for &'a MultiKeyMap<M, N, V, CM, CN, CV> {
    type Item = (&'a M, &'a N, &'a V);
    type IntoIter = Iter<'a, M, N, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
