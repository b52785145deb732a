//! indirect-ref-map: hide internal object identifiers behind short,
//! random, unguessable tokens.
//!
//! A `ReferenceMap` substitutes an `IndirectToken` for each direct
//! reference (a row key, a file path, an account id) wherever the
//! identifier would otherwise reach a URL, a form field, or another
//! client-visible surface. A client that sees or guesses a token learns
//! nothing about the reference behind it, and a forged or stale token
//! resolves to nothing.
//!
//! ```
//! use indirect_ref_map::ReferenceMap;
//!
//! let map = ReferenceMap::new();
//! let token = map.add_direct_reference("user:42").unwrap().unwrap();
//! assert_eq!(map.get_direct_reference(&token).unwrap(), "user:42");
//! assert!(map.get_direct_reference("999999x").is_err());
//! ```
//!
//! Internal Design:
//!
//! Summary
//! - Layers:
//!   - RefIndex<D>: structural layer. A `SlotMap` owns the entries; a
//!     `HashTable` indexes them by fingerprint (direct side) and a
//!     `HashMap` by token (indirect side). Single-threaded, `&mut self`.
//!   - ReferenceMap<D, S>: public API. Wraps the index and the token
//!     source in a `RwLock`, mints tokens, and runs `update`.
//!
//! Relation invariant
//! - For every live entry, the direct-side lookup of its reference and the
//!   token-side lookup of its token both reach that entry, and nothing
//!   else is reachable. Every mutation restores this before it releases
//!   the write lock.
//!
//! Fingerprints
//! - A reference's fingerprint is a 256-bit BLAKE3 digest of its `Hash`
//!   stream. It only selects the probe bucket: lookups also compare the
//!   full fingerprint and `D: Eq`, so two distinct references never share
//!   an entry even if their fingerprints collide.
//!
//! Token minting
//! - Candidates come from a `TokenSource` (the OS CSPRNG by default) and are
//!   redrawn until unused. The loop is bounded by `TokenConfig::max_attempts`
//!   and fails fast once the keyspace is full; exhaustion means the
//!   configured keyspace is too small and is reported as a fatal error.
//!
//! Update
//! - `update` builds a complete replacement index while holding the write
//!   lock, reusing old tokens for retained references, then installs it
//!   with one assignment. A failed update leaves the previous index in
//!   place.
//!
//! Notes and non-goals
//! - No expiry: callers own the map's lifetime (a session, a request).
//! - Tokens are not persisted and fingerprints are process-local.
//! - Encoding, escaping, and input validation are out of scope.

mod direct;
mod error;
mod fingerprint;
mod ref_index;
mod ref_index_proptest;
mod reference_map;
mod token;

// Public surface
pub use direct::DirectReference;
pub use error::{ConfigError, Error, Result};
pub use fingerprint::{Fingerprint, FingerprintHasher};
pub use reference_map::{DirectReferences, ReferenceMap};
pub use token::{
    Alphabet, IndirectToken, OsTokenSource, RngTokenSource, TokenConfig, TokenSource,
    MAX_TOKEN_LENGTH,
};
