//! ReferenceMap: thread-safe public layer over `RefIndex`.

use crate::direct::DirectReference;
use crate::error::{Error, Result};
use crate::ref_index::{InsertError, RefIndex};
use crate::token::{IndirectToken, OsTokenSource, TokenConfig, TokenSource};
use core::borrow::Borrow;
use core::fmt;
use parking_lot::{Mutex, RwLock};

struct State<D, S> {
    index: RefIndex<D>,
    // Only reached through `get_mut` under the write lock; the mutex keeps
    // `ReferenceMap: Sync` from requiring `S: Sync`.
    source: Mutex<S>,
}

/// Bidirectional map between direct references and random indirect tokens.
///
/// Reads take a shared lock; `add_direct_reference`,
/// `remove_direct_reference` and `update` take the exclusive lock, so no
/// reader observes one view updated without the other.
pub struct ReferenceMap<D, S = OsTokenSource> {
    config: TokenConfig,
    state: RwLock<State<D, S>>,
}

impl<D: DirectReference> ReferenceMap<D> {
    /// Empty map with the default token shape and the OS random source.
    pub fn new() -> Self {
        Self {
            config: TokenConfig::default(),
            state: RwLock::new(State {
                index: RefIndex::new(),
                source: Mutex::new(OsTokenSource::default()),
            }),
        }
    }

    /// Map seeded with `references`, each under a freshly minted token.
    pub fn from_references<I>(references: I) -> Result<Self>
    where
        I: IntoIterator<Item = D>,
    {
        let map = Self::new();
        map.update(references)?;
        Ok(map)
    }
}

impl<D: DirectReference> Default for ReferenceMap<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D, S> ReferenceMap<D, S>
where
    D: DirectReference,
    S: TokenSource,
{
    /// Empty map minting tokens from `source` shaped by `config`.
    pub fn with_source(config: TokenConfig, source: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: RwLock::new(State {
                index: RefIndex::new(),
                source: Mutex::new(source),
            }),
        })
    }

    pub fn with_source_and_references<I>(
        config: TokenConfig,
        source: S,
        references: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = D>,
    {
        let map = Self::with_source(config, source)?;
        map.update(references)?;
        Ok(map)
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.state.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().index.is_empty()
    }

    /// Token currently standing in for `direct`, if any. Never mints.
    pub fn get_indirect_reference<Q>(&self, direct: &Q) -> Option<IndirectToken>
    where
        D: Borrow<Q>,
        Q: ?Sized + DirectReference,
    {
        if direct.is_empty_reference() {
            return None;
        }
        self.state.read().index.find_token(direct).cloned()
    }

    /// Resolve a token received from a client.
    ///
    /// Empty, forged, and stale tokens all fail with
    /// [`Error::InvalidIndirectReference`]; callers should answer with a
    /// generic access-denied response.
    pub fn get_direct_reference(&self, token: &str) -> Result<D>
    where
        D: Clone,
    {
        if !token.is_empty() {
            if let Some(direct) = self.state.read().index.find_direct(token) {
                return Ok(direct.clone());
            }
        }
        tracing::warn!(
            token_len = token.len(),
            "rejected request for invalid indirect reference"
        );
        Err(Error::InvalidIndirectReference)
    }

    pub fn contains_direct_reference<Q>(&self, direct: &Q) -> bool
    where
        D: Borrow<Q>,
        Q: ?Sized + DirectReference,
    {
        !direct.is_empty_reference() && self.state.read().index.contains_direct(direct)
    }

    pub fn contains_indirect_reference(&self, token: &str) -> bool {
        self.state.read().index.contains_token(token)
    }

    /// Token for `direct`, minting one if it is not yet mapped.
    ///
    /// Returns `Ok(None)` for an empty reference. Adding a live reference
    /// again returns its existing token.
    pub fn add_direct_reference(&self, direct: D) -> Result<Option<IndirectToken>> {
        if direct.is_empty_reference() {
            return Ok(None);
        }
        let mut guard = self.state.write();
        let State { index, source } = &mut *guard;
        let source = source.get_mut();
        let (token, minted) = index.get_or_insert_with(direct, |live| {
            mint_unique_token(&self.config, source, live.len(), |c| live.contains(c))
        })?;
        if minted {
            tracing::debug!(live = index.len(), "minted indirect reference");
        }
        Ok(Some(token))
    }

    /// Drop `direct` and its token. Returns the token that no longer
    /// resolves, or `None` if `direct` was empty or not mapped.
    pub fn remove_direct_reference<Q>(&self, direct: &Q) -> Option<IndirectToken>
    where
        D: Borrow<Q>,
        Q: ?Sized + DirectReference,
    {
        if direct.is_empty_reference() {
            return None;
        }
        let (_, token) = self.state.write().index.remove(direct)?;
        Some(token)
    }

    /// Replace the live set with `references`.
    ///
    /// References already mapped keep their token; new ones get a fresh
    /// token; references absent from `references` are dropped. Duplicates
    /// and empty references in the input are ignored. The replacement index
    /// is built in full before it is installed, so on error the map is
    /// unchanged.
    ///
    /// `references` is drained before the write lock is taken, so the
    /// iterator may read this map.
    pub fn update<I>(&self, references: I) -> Result<()>
    where
        I: IntoIterator<Item = D>,
    {
        let references: Vec<D> = references.into_iter().collect();
        let mut guard = self.state.write();
        let State { index: old, source } = &mut *guard;
        let source = source.get_mut();

        let mut next: RefIndex<D> = RefIndex::with_capacity(references.len());
        let mut kept = 0usize;
        let mut minted = 0usize;

        for direct in references {
            if direct.is_empty_reference() {
                continue;
            }
            if let Some(token) = old.find_token(&direct) {
                match next.insert(direct, token.clone()) {
                    Ok(()) => kept += 1,
                    // Repeated input; fresh tokens never collide with old ones.
                    Err(e) => debug_assert_eq!(e, InsertError::DuplicateDirect),
                }
                continue;
            }
            // Fresh tokens must also avoid every old token: a later input may
            // still reuse it, and a dropped token must not resolve to a
            // different reference right away.
            let previous = old.live_tokens();
            let (_, inserted) = next.get_or_insert_with(direct, |fresh| {
                // Old tokens already carried into `next` are counted once.
                let taken = fresh.len() + previous.len() - kept;
                mint_unique_token(&self.config, &mut *source, taken, |c| {
                    fresh.contains(c) || previous.contains(c)
                })
            })?;
            if inserted {
                minted += 1;
            }
        }

        let dropped = old.len() - kept;
        *old = next;
        tracing::debug!(kept, minted, dropped, "updated reference map");
        Ok(())
    }

    /// Snapshot of the live direct references, in no particular order.
    pub fn direct_references(&self) -> DirectReferences<D>
    where
        D: Clone,
    {
        let snapshot: Vec<D> = self
            .state
            .read()
            .index
            .iter()
            .map(|(d, _)| d.clone())
            .collect();
        DirectReferences {
            it: snapshot.into_iter(),
        }
    }
}

impl<D, S> fmt::Debug for ReferenceMap<D, S>
where
    D: DirectReference,
{
    // Never print references or tokens.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceMap")
            .field("len", &self.state.read().index.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Draw candidates until one is well-formed and not taken.
///
/// `taken_len` is the number of tokens `is_taken` rejects; if that already
/// fills the keyspace no candidate is drawn.
fn mint_unique_token<S, F>(
    config: &TokenConfig,
    source: &mut S,
    taken_len: usize,
    is_taken: F,
) -> Result<IndirectToken>
where
    S: TokenSource + ?Sized,
    F: Fn(&str) -> bool,
{
    let keyspace = config.keyspace();
    if taken_len as u128 >= keyspace {
        tracing::error!(keyspace, taken = taken_len, "token keyspace is full");
        return Err(Error::KeyspaceExhausted { attempts: 0 });
    }
    for attempt in 1..=config.max_attempts {
        let candidate = source.next_token(config.length, &config.alphabet);
        if !config.admits(&candidate) {
            tracing::warn!(attempt, "token source produced a malformed candidate");
            continue;
        }
        if is_taken(&candidate) {
            tracing::trace!(attempt, "token collision, retrying");
            continue;
        }
        return Ok(IndirectToken::from(candidate));
    }
    tracing::error!(
        attempts = config.max_attempts,
        keyspace,
        taken = taken_len,
        "token keyspace exhausted; token length or alphabet is too small"
    );
    Err(Error::KeyspaceExhausted {
        attempts: config.max_attempts,
    })
}

/// Owned iterator over a snapshot of live direct references.
pub struct DirectReferences<D> {
    it: std::vec::IntoIter<D>,
}

impl<D> Iterator for DirectReferences<D> {
    type Item = D;
    #[inline]
    fn next(&mut self) -> Option<D> {
        self.it.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<D> ExactSizeIterator for DirectReferences<D> {}

impl<D> core::iter::FusedIterator for DirectReferences<D> {}
