use super::*;

use proptest::prelude::*;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
enum SetOp {
    Insert(i16),
    Delete(i16),
    Rank(i16),
    Select(usize),
    Neighbours(i16),
}

fn set_ops() -> impl Strategy<Value = Vec<SetOp>> {
    // a narrow key range so duplicates and hits are common
    let key = -40i16..40;
    let op = prop_oneof![
        40 => key.clone().prop_map(SetOp::Insert),
        25 => key.clone().prop_map(SetOp::Delete),
        15 => key.clone().prop_map(SetOp::Rank),
        10 => (0usize..90).prop_map(SetOp::Select),
        10 => key.prop_map(SetOp::Neighbours),
    ];
    prop::collection::vec(op, 0..=400)
}

fn policy() -> impl Strategy<Value = DuplicatePolicy> {
    prop_oneof![
        Just(DuplicatePolicy::Count),
        Just(DuplicatePolicy::Separate),
        Just(DuplicatePolicy::Ignore),
    ]
}

fn model_vec(m: &BTreeMap<i16, usize>) -> Vec<i16> {
    m.iter()
        .flat_map(|(&k, &n)| std::iter::repeat(k).take(n))
        .collect()
}

#[derive(Clone, Debug)]
enum SeqOp {
    Insert(usize, i32),
    Delete(usize),
    Get(usize),
    Add(usize, usize, i32),
    Assign(usize, usize, i32),
    Reverse(usize, usize),
    Query(usize, usize),
    Front(usize, usize),
    Back(usize, usize),
    Seal,
}

fn seq_ops() -> impl Strategy<Value = Vec<SeqOp>> {
    // positions are reduced modulo the current length when applied
    let pos = 0usize..1000;
    let val = -1000i32..1000;
    let op = prop_oneof![
        20 => (pos.clone(), val.clone()).prop_map(|(i, v)| SeqOp::Insert(i, v)),
        8 => pos.clone().prop_map(SeqOp::Delete),
        8 => pos.clone().prop_map(SeqOp::Get),
        12 => (pos.clone(), pos.clone(), val.clone()).prop_map(|(a, b, v)| SeqOp::Add(a, b, v)),
        6 => (pos.clone(), pos.clone(), val).prop_map(|(a, b, v)| SeqOp::Assign(a, b, v)),
        12 => (pos.clone(), pos.clone()).prop_map(|(a, b)| SeqOp::Reverse(a, b)),
        12 => (pos.clone(), pos.clone()).prop_map(|(a, b)| SeqOp::Query(a, b)),
        5 => (pos.clone(), pos.clone()).prop_map(|(a, b)| SeqOp::Front(a, b)),
        5 => (pos.clone(), pos).prop_map(|(a, b)| SeqOp::Back(a, b)),
        3 => Just(SeqOp::Seal),
    ];
    prop::collection::vec(op, 0..=300)
}

// Map two arbitrary positions onto a valid half-open range of a sequence of length `len`
fn range_of(a: usize, b: usize, len: usize) -> (usize, usize) {
    let (a, b) = (a % (len + 1), b % (len + 1));
    (a.min(b), a.max(b))
}

// Apply one op to both the sequence and the model; query results must agree
fn apply_seq_op(seq: &mut Sequence<i32>, model: &mut Vec<i32>, op: &SeqOp) {
    let len = model.len();
    match *op {
        SeqOp::Insert(i, v) => {
            let i = i % (len + 1);
            seq.insert_at(i, v).unwrap();
            model.insert(i, v);
        }
        SeqOp::Delete(i) => {
            if len == 0 {
                assert!(seq.delete_at(0).is_err());
            } else {
                let i = i % len;
                assert_eq!(seq.delete_at(i).unwrap(), model.remove(i));
            }
        }
        SeqOp::Get(i) => {
            if len == 0 {
                assert!(seq.get(0).is_err());
            } else {
                let i = i % len;
                assert_eq!(seq.view().get(i), Some(model[i]));
                assert_eq!(seq.get(i).unwrap(), model[i]);
            }
        }
        SeqOp::Add(a, b, v) => {
            let (l, r) = range_of(a, b, len);
            seq.range_add(l..r, v).unwrap();
            for x in &mut model[l..r] {
                *x = x.wrapping_add(v);
            }
        }
        SeqOp::Assign(a, b, v) => {
            let (l, r) = range_of(a, b, len);
            seq.range_assign(l..r, v).unwrap();
            model[l..r].fill(v);
        }
        SeqOp::Reverse(a, b) => {
            let (l, r) = range_of(a, b, len);
            seq.range_reverse(l..r).unwrap();
            model[l..r].reverse();
        }
        SeqOp::Query(a, b) => {
            let (l, r) = range_of(a, b, len);
            let got = seq.range_query(l..r);
            if l == r {
                assert_eq!(got, Err(TreapError::EmptyRange));
            } else {
                let s = got.unwrap();
                let part = &model[l..r];
                assert_eq!(s.len, part.len());
                assert_eq!(s.sum, part.iter().fold(0i32, |acc, x| acc.wrapping_add(*x)));
                assert_eq!(Some(s.min), part.iter().copied().min());
                assert_eq!(Some(s.max), part.iter().copied().max());
            }
        }
        SeqOp::Front(a, b) => {
            let (l, r) = range_of(a, b, len);
            seq.move_to_front(l..r).unwrap();
            model[..r].rotate_left(l);
        }
        SeqOp::Back(a, b) => {
            let (l, r) = range_of(a, b, len);
            seq.move_to_back(l..r).unwrap();
            model[l..].rotate_left(r - l);
        }
        SeqOp::Seal => {}
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_ordered_matches_model(ops in set_ops(), policy in policy(), seed in any::<u64>()) {
        let mut set: OrderedSet<i16> = TreapBuilder::new()
            .seed(seed)
            .duplicates(policy)
            .ordered_set()
            .unwrap();
        let mut m: BTreeMap<i16, usize> = BTreeMap::new();

        for op in ops {
            match op {
                SetOp::Insert(k) => {
                    let changed = set.insert(k).unwrap();
                    let present = m.contains_key(&k);
                    if policy == DuplicatePolicy::Ignore && present {
                        prop_assert!(!changed);
                    } else {
                        prop_assert!(changed);
                        *m.entry(k).or_insert(0) += 1;
                    }
                }
                SetOp::Delete(k) => {
                    let removed = set.delete(&k).unwrap();
                    match m.get_mut(&k) {
                        Some(n) => {
                            prop_assert!(removed);
                            *n -= 1;
                            if *n == 0 {
                                m.remove(&k);
                            }
                        }
                        None => prop_assert!(!removed),
                    }
                }
                SetOp::Rank(k) => {
                    let less: usize = m.range(..k).map(|(_, n)| n).sum();
                    prop_assert_eq!(set.count_less(&k), less);
                    let want = m.contains_key(&k).then_some(less + 1);
                    prop_assert_eq!(set.rank(&k), want);
                    prop_assert_eq!(set.count(&k), m.get(&k).copied().unwrap_or(0));
                }
                SetOp::Select(k) => {
                    let flat = model_vec(&m);
                    let want = k.checked_sub(1).and_then(|i| flat.get(i).copied());
                    prop_assert_eq!(set.select(k), want);
                }
                SetOp::Neighbours(k) => {
                    prop_assert_eq!(set.predecessor(&k), m.range(..k).next_back().map(|(&k, _)| k));
                    let after = m.range((std::ops::Bound::Excluded(k), std::ops::Bound::Unbounded));
                    prop_assert_eq!(set.successor(&k), after.map(|(&k, _)| k).next());
                }
            }
            prop_assert_eq!(set.len(), m.values().sum::<usize>());
        }

        prop_assert_eq!(set.tree.check(set.root), model_vec(&m));
        prop_assert_eq!(set.to_vec(), model_vec(&m));
    }

    #[test]
    fn prop_sequence_matches_model(ops in seq_ops(), seed in any::<u64>()) {
        let mut seq: Sequence<i32> = TreapBuilder::new().seed(seed).sequence().unwrap();
        let mut model: Vec<i32> = Vec::new();

        for op in &ops {
            apply_seq_op(&mut seq, &mut model, op);
            prop_assert_eq!(seq.len(), model.len());
        }

        prop_assert_eq!(seq.tree.check(seq.root), model.clone());
        prop_assert_eq!(seq.to_vec(), model);
    }

    #[test]
    fn prop_split_merge_roundtrip(len in 0usize..200, seed in any::<u64>(), ops in seq_ops()) {
        let mut seq: Sequence<i32> = TreapBuilder::new()
            .seed(seed)
            .sequence_from(0..len as i32)
            .unwrap();
        let mut model: Vec<i32> = (0..len as i32).collect();
        // leave a scatter of pending tags behind before cutting
        for op in ops.iter().take(20) {
            apply_seq_op(&mut seq, &mut model, op);
        }

        let tree = &mut seq.tree;
        for k in 0..=model.len() {
            let (a, b) = tree.split(seq.root, crate::treap::Criterion::First(k)).unwrap();
            prop_assert_eq!(tree.check(a), model[..k].to_vec());
            prop_assert_eq!(tree.check(b), model[k..].to_vec());
            seq.root = tree.merge(a, b).unwrap();
        }
        prop_assert_eq!(tree.check(seq.root), model);
    }

    #[test]
    fn prop_sealed_versions_never_change(ops in seq_ops(), seed in any::<u64>()) {
        let seq: Sequence<i32> = TreapBuilder::new().seed(seed).sequence().unwrap();
        let mut history = Versioned::new(seq);
        let mut model: Vec<i32> = Vec::new();
        let mut sealed: Vec<(VersionId, Vec<i32>)> = Vec::new();

        for (step, op) in ops.iter().enumerate() {
            if let SeqOp::Seal = op {
                sealed.push((history.seal(), model.clone()));
            } else {
                apply_seq_op(history.current_mut(), &mut model, op);
            }
            if step % 50 == 49 {
                history.compact();
            }
        }

        for (version, want) in &sealed {
            prop_assert_eq!(&history.snapshot(*version).unwrap().to_vec(), want);
            let len = history.query_at(*version, |seq| seq.len()).unwrap();
            prop_assert_eq!(len, want.len());
        }
        let live = history.current();
        prop_assert_eq!(live.tree.check(live.root), model);
    }
}
