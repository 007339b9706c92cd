//! DenseTable: a hash index over a dense entry vector.
//!
//! Both levels of the map use this table: the outer level maps major
//! keys to inner tables, the inner level maps minor keys to values.
//! Entries live contiguously in `entries`; `index` stores positions into
//! it. That layout lets cursors address an entry by position without
//! borrowing the table between steps.
//!
//! Each entry keeps the hash computed at insertion; rehashing the index
//! reads the stored hash and never calls back into the comparer.
//! Removal is `swap_remove`, so positions are stable only until the next
//! removal. Every removal is a structural mutation of the owning map,
//! which invalidates outstanding cursors anyway.

use crate::comparer::KeyComparer;
use crate::error::{MapError, Result};
use core::borrow::Borrow;
use hashbrown::HashTable;

#[derive(Clone)]
pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    hash: u64,
}

#[derive(Clone)]
pub(crate) struct DenseTable<K, V> {
    index: HashTable<usize>,
    entries: Vec<Entry<K, V>>,
}

impl<K, V> Default for DenseTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> DenseTable<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            index: HashTable::new(),
            entries: Vec::new(),
        }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashTable::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    #[inline]
    pub(crate) fn entries(&self) -> &[Entry<K, V>] {
        &self.entries
    }

    #[inline]
    pub(crate) fn entries_mut(&mut self) -> &mut [Entry<K, V>] {
        &mut self.entries
    }

    /// Position of the entry equal to `q`, given its precomputed hash.
    pub(crate) fn find_hashed<Q, C>(&self, cmp: &C, hash: u64, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        let entries = &self.entries;
        self.index
            .find(hash, |&pos| {
                let e = &entries[pos];
                e.hash == hash && cmp.eq(e.key.borrow(), q)
            })
            .copied()
    }

    pub(crate) fn find<Q, C>(&self, cmp: &C, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        self.find_hashed(cmp, cmp.hash(q), q)
    }

    pub(crate) fn get<Q, C>(&self, cmp: &C, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        let pos = self.find(cmp, q)?;
        Some(&self.entries[pos].value)
    }

    pub(crate) fn get_mut<Q, C>(&mut self, cmp: &C, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        let pos = self.find(cmp, q)?;
        Some(&mut self.entries[pos].value)
    }

    #[inline]
    pub(crate) fn value_at_mut(&mut self, pos: usize) -> &mut V {
        &mut self.entries[pos].value
    }

    /// Append an entry whose key the caller has checked is absent.
    pub(crate) fn push_unique(&mut self, hash: u64, key: K, value: V) -> usize {
        let pos = self.entries.len();
        self.entries.push(Entry { key, value, hash });
        let entries = &self.entries;
        let _ = self.index.insert_unique(hash, pos, |&p| entries[p].hash);
        pos
    }

    /// Unlink and return the entry at `pos`. The last entry moves into
    /// `pos`.
    pub(crate) fn remove_at(&mut self, pos: usize) -> (K, V) {
        let hash = self.entries[pos].hash;
        match self.index.find_entry(hash, |&p| p == pos) {
            Ok(occupied) => {
                let _ = occupied.remove();
            }
            Err(_) => debug_assert!(false, "entry at {pos} missing from index"),
        }

        let last = self.entries.len() - 1;
        let entry = self.entries.swap_remove(pos);
        if pos != last {
            let moved_hash = self.entries[pos].hash;
            if let Some(slot) = self.index.find_mut(moved_hash, |&p| p == last) {
                *slot = pos;
            }
        }
        (entry.key, entry.value)
    }

    pub(crate) fn remove<Q, C>(&mut self, cmp: &C, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        let pos = self.find(cmp, q)?;
        Some(self.remove_at(pos))
    }

    /// Drop every entry but keep both allocations for reuse.
    pub(crate) fn clear(&mut self) {
        self.index.clear();
        self.entries.clear();
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|e| (&e.key, &e.value))
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|e| &e.value)
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries.iter_mut().map(|e| &mut e.value)
    }

    /// Check that index and entries describe the same set of positions.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.index.len() != self.entries.len() {
            return Err(MapError::InvariantViolated(
                "index and entry counts disagree",
            ));
        }
        for (pos, e) in self.entries.iter().enumerate() {
            if self.index.find(e.hash, |&p| p == pos).is_none() {
                return Err(MapError::InvariantViolated("entry unreachable from index"));
            }
        }
        Ok(())
    }
}

impl<K: core::fmt::Debug, V: core::fmt::Debug> core::fmt::Debug for DenseTable<K, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparer::HashComparer;
    use core::hash::BuildHasher;
    use std::collections::BTreeSet;

    fn put<K: core::hash::Hash + Eq, V>(
        t: &mut DenseTable<K, V>,
        c: &HashComparer,
        k: K,
        v: V,
    ) -> usize {
        let h = KeyComparer::<K>::hash(c, &k);
        assert!(t.find_hashed(c, h, &k).is_none());
        t.push_unique(h, k, v)
    }

    /// Invariant: every pushed key resolves to its own position; absent keys miss.
    #[test]
    fn push_then_find() {
        let c = HashComparer::new();
        let mut t: DenseTable<String, i32> = DenseTable::new();
        for (i, k) in ["a", "b", "c"].iter().enumerate() {
            assert_eq!(put(&mut t, &c, (*k).to_string(), i as i32), i);
        }
        assert_eq!(t.len(), 3);
        assert_eq!(t.get(&c, "b"), Some(&1));
        assert_eq!(t.find(&c, "c"), Some(2));
        assert!(t.get(&c, "z").is_none());
        t.validate().unwrap();
    }

    /// Invariant: `remove_at` moves the last entry into the hole and the index
    /// follows it; remaining keys stay reachable.
    #[test]
    fn swap_remove_keeps_index_consistent() {
        let c = HashComparer::new();
        let mut t: DenseTable<u32, u32> = DenseTable::new();
        for k in 0..10 {
            put(&mut t, &c, k, k * 10);
        }
        let (k, v) = t.remove(&c, &3).unwrap();
        assert_eq!((k, v), (3, 30));
        assert_eq!(t.find(&c, &9), Some(3), "last entry fills the hole");
        t.validate().unwrap();

        // Removing the last position needs no fix-up.
        let last = t.len() - 1;
        t.remove_at(last);
        t.validate().unwrap();

        let left: BTreeSet<u32> = t.iter().map(|(k, _)| *k).collect();
        let expected: BTreeSet<u32> = [0, 1, 2, 4, 5, 6, 7, 9].into_iter().collect();
        assert_eq!(left, expected);
        for k in &expected {
            assert_eq!(t.get(&c, k), Some(&(k * 10)));
        }
    }

    /// Invariant: `clear` leaves an empty table that keeps its allocation
    /// and accepts fresh entries.
    #[test]
    fn clear_keeps_capacity() {
        let c = HashComparer::new();
        let mut t: DenseTable<u32, ()> = DenseTable::with_capacity(16);
        for k in 0..12 {
            put(&mut t, &c, k, ());
        }
        let cap = t.capacity();
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.capacity(), cap);
        assert!(t.get(&c, &1).is_none());

        put(&mut t, &c, 5, ());
        assert_eq!(t.find(&c, &5), Some(0));
        t.validate().unwrap();
    }

    /// Invariant: lookups resolve by equality under total hash collisions.
    #[test]
    fn collisions_resolve_by_equality() {
        #[derive(Clone, Default)]
        struct ConstBuildHasher;
        struct ConstHasher;
        impl BuildHasher for ConstBuildHasher {
            type Hasher = ConstHasher;
            fn build_hasher(&self) -> Self::Hasher {
                ConstHasher
            }
        }
        impl core::hash::Hasher for ConstHasher {
            fn write(&mut self, _bytes: &[u8]) {}
            fn finish(&self) -> u64 {
                0
            }
        }

        let c = HashComparer::with_hasher(ConstBuildHasher);
        let mut t: DenseTable<&'static str, i32> = DenseTable::new();
        for (i, k) in ["a", "b", "c", "d"].into_iter().enumerate() {
            let h = KeyComparer::<&str>::hash(&c, &k);
            t.push_unique(h, k, i as i32);
        }
        assert_eq!(t.get(&c, &"c"), Some(&2));
        t.remove(&c, &"a").unwrap();
        assert_eq!(t.get(&c, &"d"), Some(&3));
        assert!(t.get(&c, &"a").is_none());
        t.validate().unwrap();
    }
}
