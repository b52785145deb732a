//! Fingerprint: a wide digest of a direct reference's `Hash` stream.
//!
//! The value is fed through `core::hash::Hash` into a BLAKE3 key-derivation
//! hasher, so value-equal references produce equal fingerprints regardless
//! of which instance is hashed. Fingerprints live in memory only; the
//! `Hash` stream of a type is not guaranteed stable across compiler
//! versions or platforms, so they must never be persisted.

use core::fmt;
use core::hash::{Hash, Hasher};

// Domain separation for the derive-key mode.
const CONTEXT: &str = "indirect-ref-map direct reference fingerprint v1";

/// 256-bit fingerprint of a direct reference.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint `value` by streaming its `Hash` impl through BLAKE3.
    pub fn of<T: Hash + ?Sized>(value: &T) -> Self {
        let mut h = FingerprintHasher::new();
        value.hash(&mut h);
        h.fingerprint()
    }

    /// Leading 64 bits, used as the probe hash in the direct-side table.
    #[inline]
    pub fn bucket(&self) -> u64 {
        let mut head = [0u8; 8];
        head.copy_from_slice(&self.0[..8]);
        u64::from_le_bytes(head)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::LowerHex for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.as_bytes() {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    // Short form; the full digest is noise in logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:016x})", self.bucket())
    }
}

/// `Hasher` adapter over BLAKE3. `finish` exposes the leading 64 bits.
pub struct FingerprintHasher {
    inner: blake3::Hasher,
}

impl FingerprintHasher {
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new_derive_key(CONTEXT),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint(*self.inner.finalize().as_bytes())
    }
}

impl Default for FingerprintHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for FingerprintHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    fn finish(&self) -> u64 {
        self.fingerprint().bucket()
    }
}
