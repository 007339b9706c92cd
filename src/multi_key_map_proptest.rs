#![cfg(test)]

// Property tests for MultiKeyMap kept inside the crate so they can call
// the hidden `validate` and see pool internals through the public counters.

use crate::comparer::{HashComparer, PartialEqComparer};
use crate::error::MapError;
use crate::multi_key_map::MultiKeyMap;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations to improve shrinking: major indices shrink to
// earlier keys, minor keys to smaller numbers.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, u8, i32),
    Set(usize, u8, i32),
    Remove(usize, u8),
    Get(usize, u8),
    ContainsMajor(String),
    ClearMajor(usize),
    ClearMinor(u8),
    Clear,
    QueryMajor(usize),
    QueryMinor(u8),
    Iterate,
    Walk,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=6).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let minor = 0u8..6;
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            4 => (idx.clone(), minor.clone(), any::<i32>()).prop_map(|(i, n, v)| OpI::Insert(i, n, v)),
            2 => (idx.clone(), minor.clone(), any::<i32>()).prop_map(|(i, n, v)| OpI::Set(i, n, v)),
            3 => (idx.clone(), minor.clone()).prop_map(|(i, n)| OpI::Remove(i, n)),
            2 => (idx.clone(), minor.clone()).prop_map(|(i, n)| OpI::Get(i, n)),
            1 => prop_oneof![
                contains_pool.prop_map(|s: String| s),
                "[a-z]{0,4}".prop_map(|s| s)
            ]
            .prop_map(OpI::ContainsMajor),
            1 => idx.clone().prop_map(OpI::ClearMajor),
            1 => minor.clone().prop_map(OpI::ClearMinor),
            1 => Just(OpI::Clear),
            1 => idx.clone().prop_map(OpI::QueryMajor),
            1 => minor.clone().prop_map(OpI::QueryMinor),
            1 => Just(OpI::Iterate),
            1 => Just(OpI::Walk),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

type Sut<S> = MultiKeyMap<Key, u8, i32, HashComparer<S>, HashComparer<S>, PartialEqComparer>;
type Model = HashMap<(Key, u8), i32>;

fn triples<'a, I>(it: I) -> BTreeSet<(Key, u8, i32)>
where
    I: IntoIterator<Item = (&'a Key, &'a u8, &'a i32)>,
{
    it.into_iter().map(|(m, n, v)| (m.clone(), *n, *v)).collect()
}

fn model_triples<'a, I>(it: I) -> BTreeSet<(Key, u8, i32)>
where
    I: IntoIterator<Item = (&'a (Key, u8), &'a i32)>,
{
    it.into_iter().map(|((m, n), v)| (m.clone(), *n, *v)).collect()
}

// Drives one scenario; each step applies an op to both sides and returns
// whether the model changed structurally.
fn run<S: BuildHasher>(
    mut sut: Sut<S>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: Model = HashMap::new();

    for op in ops {
        let before = sut.version();
        let bumps = match op {
            OpI::Insert(i, n, v) => {
                let k = key_from(pool, i);
                let already = model.contains_key(&(k.clone(), n));
                match sut.insert(k.clone(), n, v) {
                    Ok(()) => {
                        prop_assert!(!already, "insert must fail on duplicate");
                        model.insert((k, n), v);
                        true
                    }
                    Err(MapError::DuplicateKey) => {
                        prop_assert!(already, "duplicate error only when key exists");
                        false
                    }
                    Err(e) => return Err(TestCaseError::fail(format!("unexpected {e}"))),
                }
            }
            OpI::Set(i, n, v) => {
                let k = key_from(pool, i);
                let prev = sut.set(k.clone(), n, v);
                prop_assert_eq!(prev, model.insert((k, n), v));
                true
            }
            OpI::Remove(i, n) => {
                let k = key_from(pool, i);
                let got = sut.remove(k.0.as_str(), &n);
                let want = model.remove(&(k, n));
                prop_assert_eq!(got, want);
                want.is_some()
            }
            OpI::Get(i, n) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.get(&k, &n), model.get(&(k.clone(), n)));
                prop_assert_eq!(sut.contains_key(&k, &n), model.contains_key(&(k, n)));
                false
            }
            OpI::ContainsMajor(s) => {
                let want = model.keys().any(|(m, _)| m.0 == s);
                prop_assert_eq!(sut.contains_major_key(s.as_str()), want);
                false
            }
            OpI::ClearMajor(i) => {
                let k = key_from(pool, i);
                let want = model.keys().filter(|(m, _)| *m == k).count();
                model.retain(|(m, _), _| *m != k);
                prop_assert_eq!(sut.clear_major_key(&k), want);
                want > 0
            }
            OpI::ClearMinor(n) => {
                let want = model.keys().filter(|(_, x)| *x == n).count();
                model.retain(|(_, x), _| *x != n);
                prop_assert_eq!(sut.clear_minor_key(&n), want);
                want > 0
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
                true
            }
            OpI::QueryMajor(i) => {
                let k = key_from(pool, i);
                let mut out = None;
                let hit = sut.query_values_with_major_key(&k, &mut out);
                let want = model_triples(model.iter().filter(|((m, _), _)| *m == k));
                prop_assert_eq!(hit, !want.is_empty());
                prop_assert_eq!(out.is_some(), hit, "destination allocated only on a hit");
                prop_assert_eq!(triples(out.unwrap_or_default()), want);
                false
            }
            OpI::QueryMinor(n) => {
                let mut out = None;
                let hit = sut.query_values_with_minor_key(&n, &mut out);
                let want = model_triples(model.iter().filter(|((_, x), _)| *x == n));
                prop_assert_eq!(hit, !want.is_empty());
                prop_assert_eq!(out.is_some(), hit, "destination allocated only on a hit");
                prop_assert_eq!(triples(out.unwrap_or_default()), want);
                false
            }
            OpI::Iterate => {
                prop_assert_eq!(triples(sut.iter()), model_triples(model.iter()));
                prop_assert_eq!(sut.iter().count(), model.len());
                false
            }
            OpI::Walk => {
                let mut c = sut.cursor();
                let mut seen = Vec::new();
                while let Some((m, n, v)) = c.advance(&sut).map_err(|e| TestCaseError::fail(e.to_string()))? {
                    seen.push((m.clone(), *n, *v));
                }
                prop_assert_eq!(seen.len(), model.len());
                prop_assert_eq!(seen.into_iter().collect::<BTreeSet<_>>(), model_triples(model.iter()));
                false
            }
        };

        // Post-conditions after each op
        // 1) Version moves exactly on structural change.
        if bumps {
            prop_assert!(sut.version() > before, "mutation must bump version");
        } else {
            prop_assert_eq!(sut.version(), before, "queries and misses keep version");
        }
        // 2) Size parity on both axes.
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        let majors: BTreeSet<&Key> = model.keys().map(|(m, _)| m).collect();
        prop_assert_eq!(sut.major_key_count(), majors.len());
        for m in &majors {
            let want = model.keys().filter(|(k, _)| k == *m).count();
            prop_assert_eq!(sut.minor_key_count(*m), want);
        }
        // 3) Structural invariants (no empty reachable tables, count
        //    agreement, empty pool).
        sut.validate().map_err(|e| TestCaseError::fail(e.to_string()))?;
    }
    Ok(())
}

// Property: State-machine equivalence against HashMap<(M, N), V>.
// Invariants exercised across random operation sequences:
// - Duplicate inserts are rejected and leave the map unchanged.
// - `get`/`contains_key` parity; `remove` returns the model's value.
// - Axis clears remove exactly the matching entries.
// - One-axis queries append exactly the matching entries and allocate only on a hit.
// - `iter` and cursors yield each live entry exactly once.
// - Version bumps on every structural change and nowhere else.
// - Pooled tables are reused without leaking stale entries.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let sut: Sut<std::collections::hash_map::RandomState> = MultiKeyMap::new();
        run(sut, &pool, ops)?;
    }
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Property: Same state-machine invariants as above, under worst-case
// collision behavior on both axes.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let sut: Sut<ConstBuildHasher> = MultiKeyMap::with_comparers(
            0,
            HashComparer::with_hasher(ConstBuildHasher),
            HashComparer::with_hasher(ConstBuildHasher),
            PartialEqComparer,
        );
        run(sut, &pool, ops)?;
    }
}

// Property: a cursor fails with `Modified` exactly when a structural
// mutation happened after it was created.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_cursor_fails_fast((pool, ops) in arb_scenario(), seed in proptest::collection::vec((0usize..6, 0u8..6), 1..12)) {
        let mut sut: Sut<std::collections::hash_map::RandomState> = MultiKeyMap::new();
        for (i, n) in seed {
            let _ = sut.insert(key_from(&pool, i % pool.len()), n, 0);
        }
        let mut c = sut.cursor();
        let v0 = sut.version();
        for op in ops {
            match op {
                OpI::Insert(i, n, v) => { let _ = sut.insert(key_from(&pool, i), n, v); }
                OpI::Set(i, n, v) => { let _ = sut.set(key_from(&pool, i), n, v); }
                OpI::Remove(i, n) => { let _ = sut.remove(&key_from(&pool, i), &n); }
                OpI::ClearMajor(i) => { let _ = sut.clear_major_key(&key_from(&pool, i)); }
                OpI::ClearMinor(n) => { let _ = sut.clear_minor_key(&n); }
                OpI::Clear => sut.clear(),
                _ => {}
            }
            let r = c.advance(&sut);
            if sut.version() == v0 {
                prop_assert!(r.is_ok());
            } else {
                prop_assert_eq!(r, Err(MapError::Modified));
            }
        }
    }
}
