#![cfg(test)]

// Property tests for RefIndex kept inside the crate so they can reach the
// crate-private structural layer.

use crate::ref_index::{InsertError, RefIndex};
use crate::token::IndirectToken;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};

// Pool-indexed operations: indices shrink toward earlier references, and
// token indices draw from a small pool so duplicate tokens actually occur.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, usize),
    Remove(usize),
    FindToken(usize),
    FindDirect(usize),
    Iterate,
}

fn token_pool(n: usize) -> Vec<IndirectToken> {
    (0..n).map(|i| IndirectToken::from(format!("{:06}", i))).collect()
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{1,4}", 1..=8).prop_flat_map(|pool| {
        let idx = 0..pool.len();
        let tok = 0usize..12;
        let op = prop_oneof![
            3 => (idx.clone(), tok.clone()).prop_map(|(d, t)| Op::Insert(d, t)),
            2 => idx.clone().prop_map(Op::Remove),
            1 => idx.clone().prop_map(Op::FindToken),
            1 => tok.prop_map(Op::FindDirect),
            1 => Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Drives `sut` and a (direct -> token) model through `ops`, checking
// after every step that:
// - insert fails exactly when the direct reference or the token is live;
// - find_token/find_direct agree with the model in both directions;
// - remove returns the model's token and unlinks both views;
// - iter yields the model's pairs exactly once;
// - len/is_empty parity and the structural consistency check hold.
fn run<D>(
    sut: &mut RefIndex<D>,
    pool: &[D],
    ops: Vec<Op>,
) -> Result<(), TestCaseError>
where
    D: Clone + Eq + Hash + Ord + std::fmt::Debug,
{
    let tokens = token_pool(12);
    let mut model: HashMap<D, IndirectToken> = HashMap::new();

    for op in ops {
        match op {
            Op::Insert(d, t) => {
                let direct = pool[d].clone();
                let token = tokens[t].clone();
                let direct_live = model.contains_key(&direct);
                let token_live = model.values().any(|v| *v == token);
                match sut.insert(direct.clone(), token.clone()) {
                    Ok(()) => {
                        prop_assert!(!direct_live && !token_live);
                        model.insert(direct, token);
                    }
                    Err(InsertError::DuplicateToken) => {
                        prop_assert!(token_live)
                    }
                    Err(InsertError::DuplicateDirect) => {
                        prop_assert!(direct_live && !token_live)
                    }
                }
            }
            Op::Remove(d) => {
                let direct = &pool[d];
                match (sut.remove(direct), model.remove(direct)) {
                    (Some((rd, rt)), Some(mt)) => {
                        prop_assert_eq!(&rd, direct);
                        prop_assert_eq!(&rt, &mt);
                        prop_assert!(!sut.contains_token(&rt));
                    }
                    (None, None) => {}
                    (s, m) => {
                        prop_assert!(false, "remove mismatch: {:?} vs {:?}", s, m)
                    }
                }
            }
            Op::FindToken(d) => {
                let direct = &pool[d];
                prop_assert_eq!(sut.find_token(direct), model.get(direct));
            }
            Op::FindDirect(t) => {
                let token = &tokens[t];
                let expected = model.iter().find(|(_, v)| *v == token).map(|(k, _)| k);
                prop_assert_eq!(sut.find_direct(token), expected);
            }
            Op::Iterate => {
                let s: BTreeSet<(D, IndirectToken)> =
                    sut.iter().map(|(d, t)| (d.clone(), t.clone())).collect();
                let m: BTreeSet<(D, IndirectToken)> =
                    model.iter().map(|(d, t)| (d.clone(), t.clone())).collect();
                prop_assert_eq!(s, m);
            }
        }

        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        sut.assert_consistent();
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let mut sut: RefIndex<String> = RefIndex::new();
        run(&mut sut, &pool, ops)?;
    }
}

// Key whose `Hash` feeds nothing: every fingerprint collides, so all
// lookups fall through to `Eq`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Colliding(String);
impl Hash for Colliding {
    fn hash<H: Hasher>(&self, _state: &mut H) {}
}

// Property: same invariants under worst-case fingerprint collisions.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let pool: Vec<Colliding> = pool.into_iter().map(Colliding).collect();
        let mut sut: RefIndex<Colliding> = RefIndex::new();
        run(&mut sut, &pool, ops)?;
    }
}
