//! Detached, fail-fast cursors.
//!
//! A cursor records positions and the map's version, not a borrow. Each
//! `advance(&map)` re-checks the version and fails with
//! [`MapError::Modified`] if the map changed structurally since the
//! cursor was created or last reset. This lets callers interleave
//! enumeration with other work on the map and get a loud error, rather
//! than a skewed traversal, if that work mutates it.
//!
//! A cursor must be advanced against the map that created it.

use crate::comparer::KeyComparer;
use crate::error::{MapError, Result};
use crate::key::CompositeKey;
use crate::multi_key_map::MultiKeyMap;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Position {
    /// Next step opens the inner table of this outer slot.
    Outer(usize),
    /// Walking the inner table of `slot`; `next` is the entry to yield.
    Inner { slot: usize, next: usize },
    Done,
}

/// Full traversal: an outer position plus the active inner position.
///
/// Yields every `(major, minor, value)` once, major key by major key.
#[derive(Clone, Debug)]
pub struct Cursor {
    version: u64,
    pos: Position,
}

impl Cursor {
    pub(crate) fn new(version: u64) -> Self {
        Self {
            version,
            pos: Position::Outer(0),
        }
    }

    /// Step to the next entry. `Ok(None)` once exhausted.
    pub fn advance<'a, M, N, V, CM, CN, CV>(
        &mut self,
        map: &'a MultiKeyMap<M, N, V, CM, CN, CV>,
    ) -> Result<Option<(&'a M, &'a N, &'a V)>> {
        map.check_version(self.version)?;
        let slots = map.outer.entries();
        loop {
            match self.pos {
                Position::Outer(slot) => {
                    let Some(entry) = slots.get(slot) else {
                        self.pos = Position::Done;
                        return Ok(None);
                    };
                    // Reachable inner tables are never empty; one that is
                    // means the bookkeeping is broken, not "skip it".
                    if entry.value.is_empty() {
                        return Err(MapError::InvariantViolated(
                            "cursor opened an empty inner table",
                        ));
                    }
                    self.pos = Position::Inner { slot, next: 0 };
                }
                Position::Inner { slot, next } => {
                    let entry = slots
                        .get(slot)
                        .ok_or(MapError::InvariantViolated("cursor slot out of range"))?;
                    match entry.value.entries().get(next) {
                        Some(e) => {
                            self.pos = Position::Inner {
                                slot,
                                next: next + 1,
                            };
                            return Ok(Some((&entry.key, &e.key, &e.value)));
                        }
                        None => self.pos = Position::Outer(slot + 1),
                    }
                }
                Position::Done => return Ok(None),
            }
        }
    }

    /// Restart from the beginning against the map's current version.
    pub fn reset<M, N, V, CM, CN, CV>(&mut self, map: &MultiKeyMap<M, N, V, CM, CN, CV>) {
        *self = Self::new(map.version);
    }

    /// Whether the map has not changed since this cursor captured it.
    pub fn is_valid<M, N, V, CM, CN, CV>(&self, map: &MultiKeyMap<M, N, V, CM, CN, CV>) -> bool {
        map.check_version(self.version).is_ok()
    }
}

/// Entries stored under one fixed minor key, as `(major, value)`.
///
/// Filters a full traversal with the minor comparer.
#[derive(Clone, Debug)]
pub struct MajorKeyValueCursor<N> {
    inner: Cursor,
    minor: N,
}

impl<N> MajorKeyValueCursor<N> {
    pub(crate) fn new(inner: Cursor, minor: N) -> Self {
        Self { inner, minor }
    }

    pub fn minor(&self) -> &N {
        &self.minor
    }

    pub fn advance<'a, M, V, CM, CN, CV>(
        &mut self,
        map: &'a MultiKeyMap<M, N, V, CM, CN, CV>,
    ) -> Result<Option<(&'a M, &'a V)>>
    where
        CN: KeyComparer<N>,
    {
        let _g = map.reentrancy.enter();
        while let Some((major, minor, value)) = self.inner.advance(map)? {
            if map.minor_comparer.eq(minor, &self.minor) {
                return Ok(Some((major, value)));
            }
        }
        Ok(None)
    }

    pub fn reset<M, V, CM, CN, CV>(&mut self, map: &MultiKeyMap<M, N, V, CM, CN, CV>) {
        self.inner.reset(map);
    }
}

/// Entries under one fixed major key, as `(minor, value)`.
///
/// Opens that major key's inner table directly. When the major key is
/// absent the cursor starts out exhausted.
#[derive(Clone, Debug)]
pub struct MinorKeyValueCursor<M> {
    version: u64,
    major: M,
    slot: Option<usize>,
    next: usize,
}

impl<M> MinorKeyValueCursor<M> {
    /// Caller holds the map's reentrancy guard.
    pub(crate) fn new<N, V, CM, CN, CV>(map: &MultiKeyMap<M, N, V, CM, CN, CV>, major: M) -> Self
    where
        CM: KeyComparer<M>,
    {
        let slot = map.outer.find(&map.major_comparer, &major);
        Self {
            version: map.version,
            major,
            slot,
            next: 0,
        }
    }

    pub fn major(&self) -> &M {
        &self.major
    }

    pub fn advance<'a, N, V, CM, CN, CV>(
        &mut self,
        map: &'a MultiKeyMap<M, N, V, CM, CN, CV>,
    ) -> Result<Option<(&'a N, &'a V)>> {
        map.check_version(self.version)?;
        let Some(slot) = self.slot else {
            return Ok(None);
        };
        let table = &map
            .outer
            .entries()
            .get(slot)
            .ok_or(MapError::InvariantViolated("cursor slot out of range"))?
            .value;
        match table.entries().get(self.next) {
            Some(e) => {
                self.next += 1;
                Ok(Some((&e.key, &e.value)))
            }
            None => {
                self.slot = None;
                Ok(None)
            }
        }
    }

    /// Re-resolve the major key, which may have been removed or re-added
    /// since the cursor was created, and restart.
    pub fn reset<N, V, CM, CN, CV>(&mut self, map: &MultiKeyMap<M, N, V, CM, CN, CV>)
    where
        CM: KeyComparer<M>,
    {
        let _g = map.reentrancy.enter();
        self.slot = map.outer.find(&map.major_comparer, &self.major);
        self.version = map.version;
        self.next = 0;
    }
}

/// Composite keys of a full traversal.
#[derive(Clone, Debug)]
pub struct KeyCursor {
    inner: Cursor,
}

impl KeyCursor {
    pub(crate) fn new(inner: Cursor) -> Self {
        Self { inner }
    }

    pub fn advance<'a, M, N, V, CM, CN, CV>(
        &mut self,
        map: &'a MultiKeyMap<M, N, V, CM, CN, CV>,
    ) -> Result<Option<CompositeKey<&'a M, &'a N>>> {
        Ok(self
            .inner
            .advance(map)?
            .map(|(m, n, _)| CompositeKey::new(m, n)))
    }

    pub fn reset<M, N, V, CM, CN, CV>(&mut self, map: &MultiKeyMap<M, N, V, CM, CN, CV>) {
        self.inner.reset(map);
    }
}

/// Values of a full traversal.
#[derive(Clone, Debug)]
pub struct ValueCursor {
    inner: Cursor,
}

impl ValueCursor {
    pub(crate) fn new(inner: Cursor) -> Self {
        Self { inner }
    }

    pub fn advance<'a, M, N, V, CM, CN, CV>(
        &mut self,
        map: &'a MultiKeyMap<M, N, V, CM, CN, CV>,
    ) -> Result<Option<&'a V>> {
        Ok(self.inner.advance(map)?.map(|(_, _, v)| v))
    }

    pub fn reset<M, N, V, CM, CN, CV>(&mut self, map: &MultiKeyMap<M, N, V, CM, CN, CV>) {
        self.inner.reset(map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    type Grid = MultiKeyMap<u32, &'static str, i32>;

    fn three() -> Grid {
        let mut m = Grid::new();
        m.insert(1, "a", 100).unwrap();
        m.insert(1, "b", 200).unwrap();
        m.insert(2, "a", 300).unwrap();
        m
    }

    fn drain(c: &mut Cursor, m: &Grid) -> Vec<(u32, &'static str, i32)> {
        let mut out = Vec::new();
        while let Some((a, b, v)) = c.advance(m).unwrap() {
            out.push((*a, *b, *v));
        }
        out
    }

    /// Invariant: a full cursor visits every entry exactly once, then stays
    /// exhausted.
    #[test]
    fn full_cursor_visits_each_entry_once() {
        let m = three();
        let mut c = m.cursor();
        let seen = drain(&mut c, &m);
        assert_eq!(seen.len(), 3);
        let set: BTreeSet<_> = seen.into_iter().collect();
        assert_eq!(
            set,
            [(1, "a", 100), (1, "b", 200), (2, "a", 300)].into_iter().collect()
        );
        assert_eq!(c.advance(&m), Ok(None));
    }

    /// Invariant: any structural mutation after creation fails the next
    /// advance, including after exhaustion.
    #[test]
    fn mutation_fails_next_advance() {
        let mut m = three();
        let mut c = m.cursor();
        assert!(c.advance(&m).unwrap().is_some());
        assert!(c.is_valid(&m));
        m.remove(&2, &"a");
        assert!(!c.is_valid(&m));
        assert_eq!(c.advance(&m), Err(MapError::Modified));

        c.reset(&m);
        assert_eq!(drain(&mut c, &m).len(), 2);
        m.set(1, "a", 7);
        assert_eq!(c.advance(&m), Err(MapError::Modified));
    }

    /// Invariant: a missed removal is not a mutation and keeps cursors valid.
    #[test]
    fn non_mutating_calls_keep_cursor_valid() {
        let mut m = three();
        let mut c = m.cursor();
        assert!(m.remove(&9, &"a").is_none());
        assert_eq!(m.clear_major_key(&9), 0);
        if let Some(v) = m.get_mut(&1, &"a") {
            *v += 1;
        }
        assert_eq!(drain(&mut c, &m).len(), 3);
    }

    /// Invariant: the fixed-minor cursor yields exactly the major keys
    /// holding that minor key.
    #[test]
    fn fixed_minor_cursor() {
        let m = three();
        let mut c = m.cursor_with_minor_key("a");
        let mut seen = BTreeSet::new();
        while let Some((major, value)) = c.advance(&m).unwrap() {
            seen.insert((*major, *value));
        }
        assert_eq!(seen, [(1, 100), (2, 300)].into_iter().collect());

        let mut none = m.cursor_with_minor_key("zz");
        assert_eq!(none.advance(&m), Ok(None));
    }

    /// Invariant: the fixed-major cursor is exhausted for an absent major key
    /// and `reset` re-resolves the key after it is added.
    #[test]
    fn fixed_major_cursor_resolves_on_reset() {
        let mut m = three();
        let mut c = m.cursor_with_major_key(5);
        assert_eq!(c.advance(&m), Ok(None));

        m.insert(5, "q", 1).unwrap();
        assert_eq!(c.advance(&m), Err(MapError::Modified));
        c.reset(&m);
        assert_eq!(c.advance(&m), Ok(Some((&"q", &1))));
        assert_eq!(c.advance(&m), Ok(None));

        let mut one = m.cursor_with_major_key(1);
        let mut minors = BTreeSet::new();
        while let Some((n, _)) = one.advance(&m).unwrap() {
            minors.insert(*n);
        }
        assert_eq!(minors, ["a", "b"].into_iter().collect());
    }

    /// Invariant: key and value cursors project the full traversal and share
    /// its fail-fast behavior.
    #[test]
    fn projection_cursors() {
        let mut m = three();
        let mut keys = m.keys().cursor();
        let mut values = m.values().cursor();
        let mut ks = BTreeSet::new();
        while let Some(k) = keys.advance(&m).unwrap() {
            ks.insert((*k.major, *k.minor));
        }
        assert_eq!(ks.len(), 3);
        let mut total = 0;
        while let Some(v) = values.advance(&m).unwrap() {
            total += *v;
        }
        assert_eq!(total, 600);

        keys.reset(&m);
        m.clear();
        assert_eq!(keys.advance(&m), Err(MapError::Modified));
        values.reset(&m);
        assert_eq!(values.advance(&m), Ok(None));
    }
}
