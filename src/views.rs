//! Read-only projections of the map and the `Collection` contract.
//!
//! [`KeyCollection`] and [`ValueCollection`] borrow the map and hold no
//! state of their own, so building one is free and every call sees the
//! map as it is now. Mutating calls through [`Collection`] fail with
//! [`MapError::ReadOnly`].

use crate::comparer::{KeyComparer, ValueComparer};
use crate::cursor::{KeyCursor, ValueCursor};
use crate::error::{MapError, Result};
use crate::iter::{Keys, Values};
use crate::key::CompositeKey;
use crate::multi_key_map::MultiKeyMap;

/// A sized, searchable group of `T` that may reject mutation.
pub trait Collection<T> {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_read_only(&self) -> bool;

    fn contains(&self, item: &T) -> bool;

    fn add(&mut self, item: T) -> Result<()>;

    /// `Ok(false)` when nothing matched.
    fn remove(&mut self, item: &T) -> Result<bool>;

    fn clear(&mut self) -> Result<()>;

    /// Clone every element into `dest[offset..]`. Nothing is written
    /// unless all elements fit.
    fn copy_to(&self, dest: &mut [T], offset: usize) -> Result<()>;
}

/// Write `items` into `dest[offset..]` after checking that `needed`
/// elements fit there.
fn copy_into<T, I>(dest: &mut [T], offset: usize, needed: usize, items: I) -> Result<()>
where
    I: Iterator<Item = T>,
{
    let available = dest.len().saturating_sub(offset);
    if offset > dest.len() || needed > available {
        return Err(MapError::DestinationTooSmall { needed, available });
    }
    for (slot, item) in dest[offset..].iter_mut().zip(items) {
        *slot = item;
    }
    Ok(())
}

/// Every composite key of a map, as a read-only collection.
pub struct KeyCollection<'a, M, N, V, CM, CN, CV> {
    map: &'a MultiKeyMap<M, N, V, CM, CN, CV>,
}

impl<'a, M, N, V, CM, CN, CV> KeyCollection<'a, M, N, V, CM, CN, CV> {
    pub(crate) fn new(map: &'a MultiKeyMap<M, N, V, CM, CN, CV>) -> Self {
        Self { map }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> Keys<'a, M, N, V> {
        Keys::new(self.map.iter())
    }

    /// Detached fail-fast cursor over the keys.
    pub fn cursor(&self) -> KeyCursor {
        KeyCursor::new(self.map.cursor())
    }

    pub fn contains<QM, QN>(&self, major: &QM, minor: &QN) -> bool
    where
        M: core::borrow::Borrow<QM>,
        N: core::borrow::Borrow<QN>,
        QM: ?Sized,
        QN: ?Sized,
        CM: KeyComparer<QM>,
        CN: KeyComparer<QN>,
    {
        self.map.contains_key(major, minor)
    }
}

impl<M, N, V, CM, CN, CV> Clone for KeyCollection<'_, M, N, V, CM, CN, CV> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M, N, V, CM, CN, CV> Copy for KeyCollection<'_, M, N, V, CM, CN, CV> {}

impl<M, N, V, CM, CN, CV> core::fmt::Debug for KeyCollection<'_, M, N, V, CM, CN, CV>
where
    M: core::fmt::Debug,
    N: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, M, N, V, CM, CN, CV> IntoIterator for KeyCollection<'a, M, N, V, CM, CN, CV> {
    type Item = CompositeKey<&'a M, &'a N>;
    type IntoIter = Keys<'a, M, N, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, M, N, V, CM, CN, CV> IntoIterator for &KeyCollection<'a, M, N, V, CM, CN, CV> {
    type Item = CompositeKey<&'a M, &'a N>;
    type IntoIter = Keys<'a, M, N, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<M, N, V, CM, CN, CV> Collection<CompositeKey<M, N>> for KeyCollection<'_, M, N, V, CM, CN, CV>
where
    M: Clone,
    N: Clone,
    CM: KeyComparer<M>,
    CN: KeyComparer<N>,
{
    fn len(&self) -> usize {
        self.map.len()
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn contains(&self, key: &CompositeKey<M, N>) -> bool {
        self.map.contains_key(&key.major, &key.minor)
    }

    fn add(&mut self, _key: CompositeKey<M, N>) -> Result<()> {
        Err(MapError::ReadOnly)
    }

    fn remove(&mut self, _key: &CompositeKey<M, N>) -> Result<bool> {
        Err(MapError::ReadOnly)
    }

    fn clear(&mut self) -> Result<()> {
        Err(MapError::ReadOnly)
    }

    fn copy_to(&self, dest: &mut [CompositeKey<M, N>], offset: usize) -> Result<()> {
        copy_into(
            dest,
            offset,
            self.map.len(),
            self.map
                .iter()
                .map(|(m, n, _)| CompositeKey::new(m.clone(), n.clone())),
        )
    }
}

/// Every value of a map, as a read-only collection.
pub struct ValueCollection<'a, M, N, V, CM, CN, CV> {
    map: &'a MultiKeyMap<M, N, V, CM, CN, CV>,
}

impl<'a, M, N, V, CM, CN, CV> ValueCollection<'a, M, N, V, CM, CN, CV> {
    pub(crate) fn new(map: &'a MultiKeyMap<M, N, V, CM, CN, CV>) -> Self {
        Self { map }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> Values<'a, M, N, V> {
        Values::new(self.map.iter())
    }

    /// Detached fail-fast cursor over the values.
    pub fn cursor(&self) -> ValueCursor {
        ValueCursor::new(self.map.cursor())
    }

    /// Linear scan with the map's value comparer.
    pub fn contains(&self, value: &V) -> bool
    where
        CV: ValueComparer<V>,
    {
        self.map.contains_value(value)
    }
}

impl<M, N, V, CM, CN, CV> Clone for ValueCollection<'_, M, N, V, CM, CN, CV> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M, N, V, CM, CN, CV> Copy for ValueCollection<'_, M, N, V, CM, CN, CV> {}

impl<M, N, V, CM, CN, CV> core::fmt::Debug for ValueCollection<'_, M, N, V, CM, CN, CV>
where
    V: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, M, N, V, CM, CN, CV> IntoIterator for ValueCollection<'a, M, N, V, CM, CN, CV> {
    type Item = &'a V;
    type IntoIter = Values<'a, M, N, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, M, N, V, CM, CN, CV> IntoIterator for &ValueCollection<'a, M, N, V, CM, CN, CV> {
    type Item = &'a V;
    type IntoIter = Values<'a, M, N, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<M, N, V, CM, CN, CV> Collection<V> for ValueCollection<'_, M, N, V, CM, CN, CV>
where
    V: Clone,
    CV: ValueComparer<V>,
{
    fn len(&self) -> usize {
        self.map.len()
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn contains(&self, value: &V) -> bool {
        self.map.contains_value(value)
    }

    fn add(&mut self, _value: V) -> Result<()> {
        Err(MapError::ReadOnly)
    }

    fn remove(&mut self, _value: &V) -> Result<bool> {
        Err(MapError::ReadOnly)
    }

    fn clear(&mut self) -> Result<()> {
        Err(MapError::ReadOnly)
    }

    fn copy_to(&self, dest: &mut [V], offset: usize) -> Result<()> {
        copy_into(dest, offset, self.map.len(), self.iter().cloned())
    }
}

/// The map as a mutable collection of `((major, minor), value)` pairs.
///
/// `remove` only removes when the stored value also matches under the
/// value comparer.
impl<M, N, V, CM, CN, CV> Collection<((M, N), V)> for MultiKeyMap<M, N, V, CM, CN, CV>
where
    M: Clone,
    N: Clone,
    V: Clone,
    CM: KeyComparer<M>,
    CN: KeyComparer<N>,
    CV: ValueComparer<V>,
{
    fn len(&self) -> usize {
        MultiKeyMap::len(self)
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn contains(&self, ((major, minor), value): &((M, N), V)) -> bool {
        self.get(major, minor)
            .is_some_and(|stored| self.value_comparer().eq(stored, value))
    }

    fn add(&mut self, ((major, minor), value): ((M, N), V)) -> Result<()> {
        self.insert(major, minor, value)
    }

    fn remove(&mut self, item: &((M, N), V)) -> Result<bool> {
        if !Collection::contains(self, item) {
            return Ok(false);
        }
        let ((major, minor), _) = item;
        Ok(MultiKeyMap::remove(self, major, minor).is_some())
    }

    fn clear(&mut self) -> Result<()> {
        MultiKeyMap::clear(self);
        Ok(())
    }

    fn copy_to(&self, dest: &mut [((M, N), V)], offset: usize) -> Result<()> {
        copy_into(
            dest,
            offset,
            MultiKeyMap::len(self),
            self.iter()
                .map(|(m, n, v)| ((m.clone(), n.clone()), v.clone())),
        )
    }
}
