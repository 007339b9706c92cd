//! Borrowing iterators over `MultiKeyMap`.
//!
//! These hold a shared (or exclusive) borrow of the map, so the borrow
//! checker already rules out structural mutation while they live. For
//! enumeration that spans mutations, use the cursors in
//! [`crate::cursor`].

use crate::dense_table::Entry;
use crate::key::CompositeKey;
use crate::multi_key_map::InnerTable;
use core::iter::FusedIterator;
use core::slice;

type Slot<M, N, V> = Entry<M, InnerTable<N, V>>;

/// Flattened `(major, minor, value)` traversal.
pub struct Iter<'a, M, N, V> {
    outer: slice::Iter<'a, Slot<M, N, V>>,
    inner: Option<(&'a M, slice::Iter<'a, Entry<N, V>>)>,
    remaining: usize,
}

impl<'a, M, N, V> Iter<'a, M, N, V> {
    pub(crate) fn new(slots: &'a [Slot<M, N, V>], len: usize) -> Self {
        Self {
            outer: slots.iter(),
            inner: None,
            remaining: len,
        }
    }
}

impl<M, N, V> Clone for Iter<'_, M, N, V> {
    fn clone(&self) -> Self {
        Self {
            outer: self.outer.clone(),
            inner: self.inner.clone(),
            remaining: self.remaining,
        }
    }
}

impl<'a, M, N, V> Iterator for Iter<'a, M, N, V> {
    type Item = (&'a M, &'a N, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((major, entries)) = &mut self.inner {
                if let Some(e) = entries.next() {
                    self.remaining -= 1;
                    return Some((*major, &e.key, &e.value));
                }
            }
            let slot = self.outer.next()?;
            self.inner = Some((&slot.key, slot.value.entries().iter()));
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<M, N, V> ExactSizeIterator for Iter<'_, M, N, V> {}
impl<M, N, V> FusedIterator for Iter<'_, M, N, V> {}

/// Flattened traversal with mutable values.
pub struct IterMut<'a, M, N, V> {
    outer: slice::IterMut<'a, Slot<M, N, V>>,
    inner: Option<(&'a M, slice::IterMut<'a, Entry<N, V>>)>,
    remaining: usize,
}

impl<'a, M, N, V> IterMut<'a, M, N, V> {
    pub(crate) fn new(slots: &'a mut [Slot<M, N, V>], len: usize) -> Self {
        Self {
            outer: slots.iter_mut(),
            inner: None,
            remaining: len,
        }
    }
}

impl<'a, M, N, V> Iterator for IterMut<'a, M, N, V> {
    type Item = (&'a M, &'a N, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((major, entries)) = &mut self.inner {
                if let Some(e) = entries.next() {
                    self.remaining -= 1;
                    let Entry { key, value, .. } = e;
                    return Some((*major, &*key, value));
                }
            }
            let Entry { key, value, .. } = self.outer.next()?;
            self.inner = Some((&*key, value.entries_mut().iter_mut()));
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<M, N, V> ExactSizeIterator for IterMut<'_, M, N, V> {}
impl<M, N, V> FusedIterator for IterMut<'_, M, N, V> {}

/// Composite keys, in [`Iter`] order.
pub struct Keys<'a, M, N, V> {
    inner: Iter<'a, M, N, V>,
}

impl<'a, M, N, V> Keys<'a, M, N, V> {
    pub(crate) fn new(inner: Iter<'a, M, N, V>) -> Self {
        Self { inner }
    }
}

impl<'a, M, N, V> Iterator for Keys<'a, M, N, V> {
    type Item = CompositeKey<&'a M, &'a N>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(m, n, _)| CompositeKey::new(m, n))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<M, N, V> ExactSizeIterator for Keys<'_, M, N, V> {}
impl<M, N, V> FusedIterator for Keys<'_, M, N, V> {}

/// Values, in [`Iter`] order.
pub struct Values<'a, M, N, V> {
    inner: Iter<'a, M, N, V>,
}

impl<'a, M, N, V> Values<'a, M, N, V> {
    pub(crate) fn new(inner: Iter<'a, M, N, V>) -> Self {
        Self { inner }
    }
}

impl<'a, M, N, V> Iterator for Values<'a, M, N, V> {
    type Item = &'a V;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, _, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<M, N, V> ExactSizeIterator for Values<'_, M, N, V> {}
impl<M, N, V> FusedIterator for Values<'_, M, N, V> {}

#[cfg(test)]
mod tests {
    use crate::MultiKeyMap;
    use std::collections::BTreeSet;

    fn sample() -> MultiKeyMap<u8, char, u32> {
        let mut m = MultiKeyMap::new();
        for major in 0..3u8 {
            for (i, minor) in ['x', 'y', 'z'].into_iter().enumerate() {
                if (major as usize + i) % 2 == 0 {
                    m.insert(major, minor, major as u32 * 100 + i as u32).unwrap();
                }
            }
        }
        m
    }

    /// Invariant: iteration yields each stored triple exactly once and its
    /// length hint is exact.
    #[test]
    fn iter_visits_each_entry_once() {
        let m = sample();
        let it = m.iter();
        assert_eq!(it.len(), m.len());
        let seen: Vec<(u8, char, u32)> = it.map(|(a, b, c)| (*a, *b, *c)).collect();
        assert_eq!(seen.len(), m.len());
        let unique: BTreeSet<_> = seen.iter().copied().collect();
        assert_eq!(unique.len(), seen.len());
        for (a, b, c) in seen {
            assert_eq!(m.get(&a, &b), Some(&c));
        }
    }

    /// Invariant: `iter_mut` edits land in the map and do not bump the version.
    #[test]
    fn iter_mut_updates_in_place() {
        let mut m = sample();
        let v = m.version();
        for (_, _, value) in m.iter_mut() {
            *value += 1;
        }
        assert_eq!(m.version(), v);
        assert_eq!(m.get(&0, &'x'), Some(&1));
        assert_eq!(m.get(&2, &'z'), Some(&203));
    }

    /// Invariant: key and value projections line up with the full traversal.
    #[test]
    fn projections_follow_iter_order() {
        let m = sample();
        let keys: Vec<(u8, char)> = m.keys().iter().map(|k| (*k.major, *k.minor)).collect();
        let values: Vec<u32> = m.values().iter().copied().collect();
        let full: Vec<(u8, char, u32)> = m.iter().map(|(a, b, c)| (*a, *b, *c)).collect();
        assert_eq!(keys.len(), full.len());
        for (i, (a, b, c)) in full.into_iter().enumerate() {
            assert_eq!(keys[i], (a, b));
            assert_eq!(values[i], c);
        }
    }

    /// Invariant: per-axis iterators see exactly the entries on that axis.
    #[test]
    fn axis_iterators() {
        let m = sample();
        let under_zero: BTreeSet<char> = m.iter_major(&0).map(|(n, _)| *n).collect();
        assert_eq!(under_zero, ['x', 'z'].into_iter().collect());
        assert_eq!(m.iter_major(&9).count(), 0);

        let with_y: BTreeSet<u8> = m.iter_minor(&'y').map(|(major, _)| *major).collect();
        assert_eq!(with_y, [1].into_iter().collect());
    }

    #[test]
    fn empty_map_iterates_nothing() {
        let m: MultiKeyMap<u8, u8, u8> = MultiKeyMap::new();
        assert_eq!(m.iter().next(), None);
        assert_eq!((&m).into_iter().count(), 0);
    }
}
