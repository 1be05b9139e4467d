use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::BTreeMap;
use std::rc::Rc;

fn validate_map<K, V, C: Capabilities<K, V>>(m: &OrderedMap<K, V, C>) {
    assert!(
        m.slots[Link::SENTINEL.idx()].entry.is_none(),
        "sentinel must never hold an entry"
    );

    let mut live = 0usize;
    let mut prev: Option<&K> = None;
    let mut current = m.slots[Link::SENTINEL.idx()].next;
    while !current.is_null() {
        assert!(live < m.slots.len(), "cycle in live chain");
        let (key, _) = m.slots[current.idx()]
            .entry
            .as_ref()
            .expect("reachable slot must hold an entry");
        if let Some(prev) = prev {
            assert_eq!(
                m.caps.compare_keys(prev, key),
                Ordering::Less,
                "chain must be strictly increasing"
            );
        }
        prev = Some(key);
        live += 1;
        current = m.slots[current.idx()].next;
    }
    assert_eq!(live, m.count, "reachable node count must match len");

    let mut free = 0usize;
    let mut current = m.free_head;
    while !current.is_null() {
        assert!(free < m.slots.len(), "cycle in free list");
        assert!(
            m.slots[current.idx()].entry.is_none(),
            "free slot must not hold an entry"
        );
        free += 1;
        current = m.slots[current.idx()].next;
    }
    assert_eq!(
        live + free + 1,
        m.slots.len(),
        "every slot is the sentinel, live, or free"
    );
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 10)]
    Put(u8, u32),
    #[proptest(weight = 5)]
    Remove(u8),
    #[proptest(weight = 5)]
    Get(u8),
    #[proptest(weight = 2)]
    Enumerate,
    Copy,
    Clear,
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(any::<Op>(), 0..=600)
}

fn enumerate<K: Clone, V, C: Capabilities<K, V>>(m: &OrderedMap<K, V, C>) -> Vec<K> {
    let mut out = Vec::with_capacity(m.len());
    if let Some((mut cursor, first)) = m.get_first() {
        out.push(first.clone());
        while let Some(k) = m.get_next(&mut cursor) {
            out.push(k.clone());
        }
    }
    out
}

/// Counts copies and frees so leaks and double frees show up as an imbalance.
fn counting_caps(copies: &Rc<Cell<isize>>) -> FnCapabilities<u8, u32> {
    let (c1, c2, c3, c4) = (
        Rc::clone(copies),
        Rc::clone(copies),
        Rc::clone(copies),
        Rc::clone(copies),
    );
    FnCapabilities::builder()
        .copy_key(move |k: &u8| {
            c1.set(c1.get() + 1);
            Some(*k)
        })
        .copy_value(move |v: &u32| {
            c2.set(c2.get() + 1);
            Some(*v)
        })
        .free_key(move |_: u8| c3.set(c3.get() - 1))
        .free_value(move |_: u32| c4.set(c4.get() - 1))
        .compare_keys(|a: &u8, b: &u8| a.cmp(b))
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in ops_strategy()) {
        let mut t: OrderedMap<u8, u32> = OrderedMap::new();
        let mut m: BTreeMap<u8, u32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Put(key, value) => {
                    let before = t.len();
                    t.put(&key, &value).unwrap();
                    let old = m.insert(key, value);
                    let grew = if old.is_some() { 0 } else { 1 };
                    prop_assert_eq!(t.len(), before + grew);
                }
                Op::Remove(key) => {
                    let got = t.remove(&key);
                    let expected = m.remove(&key).map(|_| ()).ok_or(MapError::ItemNotFound);
                    prop_assert_eq!(got, expected);
                    prop_assert!(!t.contains(&key));
                }
                Op::Get(key) => {
                    prop_assert_eq!(t.get(&key), m.get(&key));
                    prop_assert_eq!(t.contains(&key), m.contains_key(&key));
                }
                Op::Enumerate => {
                    let keys = enumerate(&t);
                    let expected: Vec<u8> = m.keys().copied().collect();
                    prop_assert_eq!(keys, expected);
                }
                Op::Copy => {
                    let copy = t.try_copy().unwrap();
                    validate_map(&copy);
                    prop_assert_eq!(copy.len(), t.len());
                    prop_assert!(copy.iter().eq(t.iter()));
                    t = copy;
                }
                Op::Clear => {
                    t.clear();
                    m.clear();
                    prop_assert!(t.get_first().is_none());
                }
            }

            prop_assert_eq!(t.len(), m.len());
        }

        validate_map(&t);
        let got: Vec<(u8, u32)> = t.iter().map(|(k, v)| (*k, *v)).collect();
        let expected: Vec<(u8, u32)> = m.into_iter().collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_mutation_invalidates_cursor(
        keys in prop::collection::btree_set(any::<u8>(), 2..64),
        op in any::<Op>(),
    ) {
        let mut t: OrderedMap<u8, u32> = OrderedMap::new();
        for k in &keys {
            t.put(k, &u32::from(*k)).unwrap();
        }

        let (mut cursor, first) = t.get_first().unwrap();
        prop_assert_eq!(Some(first), keys.iter().next());

        let structural = match op {
            Op::Put(key, value) => t.put(&key, &value).is_ok(),
            Op::Remove(key) => t.remove(&key).is_ok(),
            Op::Clear => {
                t.clear();
                true
            }
            Op::Copy => {
                let _copy = t.try_copy().unwrap();
                true
            }
            Op::Get(key) => {
                let _ = t.get(&key);
                false
            }
            Op::Enumerate => {
                let _ = enumerate(&t);
                false
            }
        };

        let next = t.get_next(&mut cursor);
        if structural {
            prop_assert_eq!(next, None);
        } else {
            prop_assert_eq!(next, keys.iter().nth(1));
        }
    }

    #[test]
    fn prop_copies_and_frees_balance(ops in ops_strategy()) {
        let copies = Rc::new(Cell::new(0isize));
        {
            let mut t = OrderedMap::with_capabilities(counting_caps(&copies)).unwrap();
            let mut spare = Vec::new();
            for op in ops {
                match op {
                    Op::Put(key, value) => t.put(&key, &value).unwrap(),
                    Op::Remove(key) => {
                        let _ = t.remove(&key);
                    }
                    Op::Get(key) => {
                        let _ = t.get(&key);
                    }
                    Op::Enumerate => {
                        let _ = enumerate(&t);
                    }
                    Op::Copy => spare.push(t.try_copy().unwrap()),
                    Op::Clear => t.clear(),
                }
                // Two owned copies per live entry, across the map and its copies.
                let live: usize = t.len() + spare.iter().map(|c| c.len()).sum::<usize>();
                prop_assert_eq!(copies.get(), 2 * live as isize);
            }
            validate_map(&t);
        }
        prop_assert_eq!(copies.get(), 0);
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

fn small_keys() -> Vec<String> {
    ["a", "b", "c", "aa", "ab", "ba"]
        .iter()
        .map(|k| k.to_string())
        .collect()
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys = small_keys();

    for_each_permutation(&keys, |perm| {
        let mut t: OrderedMap<String, u64> = OrderedMap::new();
        let mut m: BTreeMap<String, u64> = BTreeMap::new();

        for (i, k) in perm.into_iter().enumerate() {
            let v = i as u64;
            t.put(&k, &v).unwrap();
            m.insert(k, v);
        }

        validate_map(&t);
        assert_eq!(enumerate(&t), m.keys().cloned().collect::<Vec<_>>());
        let got: Vec<(String, u64)> = t.iter().map(|(k, v)| (k.clone(), *v)).collect();
        let expected: Vec<(String, u64)> = m.into_iter().collect();
        assert_eq!(got, expected);
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    let keys = small_keys();

    // Insert in a fixed order, then remove in all permutations.
    let mut base: OrderedMap<String, u64> = OrderedMap::new();
    let mut base_model: BTreeMap<String, u64> = BTreeMap::new();
    for (i, k) in keys.iter().enumerate() {
        let v = i as u64;
        base.put(k, &v).unwrap();
        base_model.insert(k.clone(), v);
    }

    for_each_permutation(&keys, |perm| {
        let mut t = base.try_copy().unwrap();
        let mut m = base_model.clone();

        for k in perm {
            assert_eq!(t.remove(&k), Ok(()));
            m.remove(&k);
            assert_eq!(t.len(), m.len());
            assert_eq!(t.remove(&k), Err(MapError::ItemNotFound));
            validate_map(&t);
        }
        assert_eq!(t.len(), 0);
        assert!(t.slots[Link::SENTINEL.idx()].next.is_null());
    });
}
