//! RefIndex: structural layer holding both views of the direct/indirect
//! relation.
//!
//! Entries live in a generational `SlotMap`; two indices point into it:
//! - `by_direct`: a `HashTable` probed by the entry's fingerprint and
//!   resolved with `D: Eq`, so colliding fingerprints never merge entries;
//! - `by_token`: token string to entry key.
//!
//! Every `&mut self` method leaves both indices pointing at exactly the live
//! slots before it returns.

use crate::fingerprint::Fingerprint;
use crate::token::IndirectToken;
use core::borrow::Borrow;
use core::hash::Hash;
use hashbrown::hash_table::Entry as TableEntry;
use hashbrown::{HashMap, HashTable};
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    pub(crate) struct EntryKey;
}

#[derive(Debug)]
struct Entry<D> {
    direct: D,
    token: IndirectToken,
    fingerprint: Fingerprint,
}

impl<D> Entry<D> {
    #[inline]
    fn matches<Q>(&self, fp: &Fingerprint, q: &Q) -> bool
    where
        D: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.fingerprint == *fp && self.direct.borrow() == q
    }
}

pub(crate) struct RefIndex<D> {
    by_direct: HashTable<EntryKey>,
    by_token: HashMap<IndirectToken, EntryKey>,
    slots: SlotMap<EntryKey, Entry<D>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InsertError {
    DuplicateDirect,
    DuplicateToken,
}

/// Read-only view of the live token set, handed to mint callbacks.
#[derive(Clone, Copy)]
pub(crate) struct LiveTokens<'a> {
    map: &'a HashMap<IndirectToken, EntryKey>,
}

impl LiveTokens<'_> {
    #[inline]
    pub(crate) fn contains(&self, token: &str) -> bool {
        self.map.contains_key(token)
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }
}

/// Iterator over `(direct, token)` pairs.
pub(crate) struct Iter<'a, D> {
    it: slotmap::basic::Iter<'a, EntryKey, Entry<D>>,
}

impl<'a, D> Iterator for Iter<'a, D> {
    type Item = (&'a D, &'a IndirectToken);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, e)| (&e.direct, &e.token))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<D> RefIndex<D>
where
    D: Eq + Hash,
{
    pub(crate) fn new() -> Self {
        Self::with_capacity(0)
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            by_direct: HashTable::with_capacity(capacity),
            by_token: HashMap::with_capacity(capacity),
            slots: SlotMap::with_capacity_and_key(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn locate<Q>(&self, q: &Q) -> Option<EntryKey>
    where
        D: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let fp = Fingerprint::of(q);
        self.by_direct
            .find(fp.bucket(), |&k| {
                self.slots
                    .get(k)
                    .map(|e| e.matches(&fp, q))
                    .unwrap_or(false)
            })
            .copied()
    }

    pub(crate) fn find_token<Q>(&self, q: &Q) -> Option<&IndirectToken>
    where
        D: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let k = self.locate(q)?;
        self.slots.get(k).map(|e| &e.token)
    }

    pub(crate) fn contains_direct<Q>(&self, q: &Q) -> bool
    where
        D: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.locate(q).is_some()
    }

    pub(crate) fn find_direct(&self, token: &str) -> Option<&D> {
        let &k = self.by_token.get(token)?;
        self.slots.get(k).map(|e| &e.direct)
    }

    pub(crate) fn contains_token(&self, token: &str) -> bool {
        self.by_token.contains_key(token)
    }

    /// Link `direct` and `token`. Rejects a direct reference or token that is
    /// already live; the index is unchanged on error.
    pub(crate) fn insert(&mut self, direct: D, token: IndirectToken) -> Result<(), InsertError> {
        if self.by_token.contains_key(token.as_str()) {
            return Err(InsertError::DuplicateToken);
        }
        let fingerprint = Fingerprint::of(&direct);
        let entry = Entry {
            direct,
            token,
            fingerprint,
        };
        match self.by_direct.entry(
            fingerprint.bucket(),
            |&kk| {
                self.slots
                    .get(kk)
                    .map(|e| e.matches(&fingerprint, &entry.direct))
                    .unwrap_or(false)
            },
            |&kk| {
                self.slots
                    .get(kk)
                    .map(|e| e.fingerprint.bucket())
                    .unwrap_or(0)
            },
        ) {
            TableEntry::Occupied(_) => Err(InsertError::DuplicateDirect),
            TableEntry::Vacant(v) => {
                let token = entry.token.clone();
                let k = self.slots.insert(entry);
                let _ = v.insert(k);
                self.by_token.insert(token, k);
                Ok(())
            }
        }
    }

    /// Return the live token for `direct`, or link `direct` to the token
    /// produced by `mint`. `mint` runs only on a miss, sees the live token
    /// set, and must return a token absent from it. The flag is true when a
    /// new entry was linked. On error the index is unchanged.
    pub(crate) fn get_or_insert_with<F, E>(
        &mut self,
        direct: D,
        mint: F,
    ) -> Result<(IndirectToken, bool), E>
    where
        F: FnOnce(LiveTokens<'_>) -> Result<IndirectToken, E>,
    {
        let fingerprint = Fingerprint::of(&direct);
        match self.by_direct.entry(
            fingerprint.bucket(),
            |&kk| {
                self.slots
                    .get(kk)
                    .map(|e| e.matches(&fingerprint, &direct))
                    .unwrap_or(false)
            },
            |&kk| {
                self.slots
                    .get(kk)
                    .map(|e| e.fingerprint.bucket())
                    .unwrap_or(0)
            },
        ) {
            TableEntry::Occupied(o) => Ok((self.slots[*o.get()].token.clone(), false)),
            TableEntry::Vacant(v) => {
                let token = mint(LiveTokens {
                    map: &self.by_token,
                })?;
                debug_assert!(!self.by_token.contains_key(token.as_str()));
                let k = self.slots.insert(Entry {
                    direct,
                    token: token.clone(),
                    fingerprint,
                });
                let _ = v.insert(k);
                self.by_token.insert(token.clone(), k);
                Ok((token, true))
            }
        }
    }

    pub(crate) fn live_tokens(&self) -> LiveTokens<'_> {
        LiveTokens {
            map: &self.by_token,
        }
    }

    /// Unlink the entry for `q` from both indices, returning its parts.
    pub(crate) fn remove<Q>(&mut self, q: &Q) -> Option<(D, IndirectToken)>
    where
        D: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let fp = Fingerprint::of(q);
        let slots = &self.slots;
        let occupied = self
            .by_direct
            .find_entry(fp.bucket(), |&k| {
                slots.get(k).map(|e| e.matches(&fp, q)).unwrap_or(false)
            })
            .ok()?;
        let (k, _) = occupied.remove();

        let entry = self.slots.remove(k)?;
        let unlinked = self.by_token.remove(entry.token.as_str());
        debug_assert_eq!(unlinked, Some(k), "token index out of sync");

        Some((entry.direct, entry.token))
    }

    pub(crate) fn iter(&self) -> Iter<'_, D> {
        Iter {
            it: self.slots.iter(),
        }
    }

    /// Panics unless both indices describe exactly the live slots.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        assert_eq!(self.by_direct.len(), self.slots.len());
        assert_eq!(self.by_token.len(), self.slots.len());
        for (k, e) in self.slots.iter() {
            assert_eq!(self.by_token.get(e.token.as_str()), Some(&k));
            assert_eq!(e.fingerprint, Fingerprint::of(&e.direct));
            assert_eq!(self.locate(&e.direct), Some(k));
        }
    }
}

impl<D: Eq + Hash> Default for RefIndex<D> {
    fn default() -> Self {
        Self::new()
    }
}
