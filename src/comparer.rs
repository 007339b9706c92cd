//! Pluggable equality strategies.
//!
//! Keys are compared through a [`KeyComparer`], which pairs a hash with
//! an equality test. Values only need equality, through a
//! [`ValueComparer`], and only `contains_value` uses it. The defaults
//! defer to the types' own `Hash`/`Eq` and `PartialEq`.
//!
//! A comparer must keep `hash` consistent with `eq`: keys that compare
//! equal must hash equal. The map stores each key's hash at insertion
//! and never asks for it again.

use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;

/// Hash and equality strategy for one key axis.
///
/// `Q` is the type being compared; implementing it for a borrowed form
/// (`str` for `String` keys) enables borrowed lookups.
pub trait KeyComparer<Q: ?Sized> {
    fn hash(&self, key: &Q) -> u64;
    fn eq(&self, a: &Q, b: &Q) -> bool;
}

/// Equality strategy for stored values.
pub trait ValueComparer<V: ?Sized> {
    fn eq(&self, a: &V, b: &V) -> bool;
}

/// Natural key equality: `Q: Hash + Eq`, hashed with `S`.
#[derive(Clone, Debug, Default)]
pub struct HashComparer<S = RandomState> {
    hasher: S,
}

impl HashComparer<RandomState> {
    pub fn new() -> Self {
        Self {
            hasher: RandomState::new(),
        }
    }
}

impl<S> HashComparer<S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self { hasher }
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }
}

impl<Q, S> KeyComparer<Q> for HashComparer<S>
where
    Q: ?Sized + Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn hash(&self, key: &Q) -> u64 {
        self.hasher.hash_one(key)
    }

    #[inline]
    fn eq(&self, a: &Q, b: &Q) -> bool {
        a == b
    }
}

/// Structural value equality via `PartialEq`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PartialEqComparer;

impl<V: ?Sized + PartialEq> ValueComparer<V> for PartialEqComparer {
    #[inline]
    fn eq(&self, a: &V, b: &V) -> bool {
        a == b
    }
}

/// Adapts a closure pair into a [`KeyComparer`].
///
/// ```
/// use multikey_map::comparer::{FnComparer, KeyComparer};
///
/// let ci = FnComparer::new(
///     |s: &str| s.to_ascii_lowercase().len() as u64,
///     |a: &str, b: &str| a.eq_ignore_ascii_case(b),
/// );
/// assert!(ci.eq("Tile", "TILE"));
/// ```
#[derive(Clone, Copy)]
pub struct FnComparer<H, E> {
    hash: H,
    eq: E,
}

impl<H, E> FnComparer<H, E> {
    pub fn new(hash: H, eq: E) -> Self {
        Self { hash, eq }
    }
}

impl<Q, H, E> KeyComparer<Q> for FnComparer<H, E>
where
    Q: ?Sized,
    H: Fn(&Q) -> u64,
    E: Fn(&Q, &Q) -> bool,
{
    fn hash(&self, key: &Q) -> u64 {
        (self.hash)(key)
    }

    fn eq(&self, a: &Q, b: &Q) -> bool {
        (self.eq)(a, b)
    }
}

impl<V, E> ValueComparer<V> for FnComparer<(), E>
where
    V: ?Sized,
    E: Fn(&V, &V) -> bool,
{
    fn eq(&self, a: &V, b: &V) -> bool {
        (self.eq)(a, b)
    }
}

impl<E> FnComparer<(), E> {
    /// Equality-only comparer, usable as a [`ValueComparer`].
    pub fn values(eq: E) -> Self {
        Self { hash: (), eq }
    }
}

impl<H, E> core::fmt::Debug for FnComparer<H, E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("FnComparer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: equal keys hash equal under the default comparer, including
    /// across `String`/`str` borrowed forms.
    #[test]
    fn hash_comparer_consistent_across_borrowed_forms() {
        let c = HashComparer::new();
        let owned = "tile".to_string();
        assert_eq!(
            KeyComparer::<String>::hash(&c, &owned),
            KeyComparer::<String>::hash(&c, &"tile".to_string())
        );
        assert_eq!(KeyComparer::<String>::hash(&c, &owned), KeyComparer::<str>::hash(&c, "tile"));
        assert!(KeyComparer::<str>::eq(&c, "tile", owned.as_str()));
        assert!(!KeyComparer::<str>::eq(&c, "tile", "grid"));
    }

    #[test]
    fn partial_eq_comparer_uses_structural_equality() {
        let c = PartialEqComparer;
        assert!(ValueComparer::<Vec<i32>>::eq(&c, &vec![1, 2], &vec![1, 2]));
        assert!(!ValueComparer::<f64>::eq(&c, &f64::NAN, &f64::NAN));
    }

    #[test]
    fn fn_comparer_value_form() {
        let c = FnComparer::values(|a: &f64, b: &f64| (a - b).abs() < 0.5);
        assert!(ValueComparer::<f64>::eq(&c, &1.0, &1.2));
        assert!(!ValueComparer::<f64>::eq(&c, &1.0, &2.0));
    }
}
