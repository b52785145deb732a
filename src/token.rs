//! Indirect tokens, their alphabet and configuration, and the random
//! source that mints them.

use crate::error::ConfigError;
use core::borrow::Borrow;
use core::fmt;
use core::ops::Deref;
use rand::rngs::OsRng;
use rand::{CryptoRng, Rng, RngCore};

/// Longest token a [`TokenConfig`] accepts.
pub const MAX_TOKEN_LENGTH: usize = 256;

/// A client-visible capability string standing in for a direct reference.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct IndirectToken(Box<str>);

impl IndirectToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for IndirectToken {
    fn from(s: String) -> Self {
        Self(s.into_boxed_str())
    }
}

impl From<&str> for IndirectToken {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl From<IndirectToken> for String {
    fn from(t: IndirectToken) -> Self {
        t.0.into_string()
    }
}

impl Deref for IndirectToken {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for IndirectToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for IndirectToken {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for IndirectToken {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for IndirectToken {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl fmt::Display for IndirectToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for IndirectToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IndirectToken").field(&&*self.0).finish()
    }
}

/// Ordered, duplicate-free set of at least two token symbols.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct Alphabet {
    symbols: Box<[char]>,
}

impl Alphabet {
    /// Digits 1-9.
    pub const NONZERO_DIGITS: &'static str = "123456789";
    /// ASCII letters and digits.
    pub const ALPHANUMERIC: &'static str =
        "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

    pub fn new(symbols: &str) -> Result<Self, ConfigError> {
        let mut seen: Vec<char> = Vec::with_capacity(symbols.len());
        for c in symbols.chars() {
            if seen.contains(&c) {
                return Err(ConfigError::DuplicateSymbol { symbol: c });
            }
            seen.push(c);
        }
        match seen.len() {
            0 => Err(ConfigError::EmptyAlphabet),
            1 => Err(ConfigError::AlphabetTooSmall { len: 1 }),
            _ => Ok(Self {
                symbols: seen.into_boxed_slice(),
            }),
        }
    }

    pub fn nonzero_digits() -> Self {
        Self::from_trusted(Self::NONZERO_DIGITS)
    }

    pub fn alphanumeric() -> Self {
        Self::from_trusted(Self::ALPHANUMERIC)
    }

    // Constants above are known-valid; skip the duplicate scan.
    fn from_trusted(symbols: &str) -> Self {
        Self {
            symbols: symbols.chars().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// True if the alphabet has no symbols, which `new` never produces.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn contains(&self, c: char) -> bool {
        self.symbols.contains(&c)
    }

    pub fn as_chars(&self) -> &[char] {
        &self.symbols
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::nonzero_digits()
    }
}

impl TryFrom<String> for Alphabet {
    type Error = ConfigError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl TryFrom<&str> for Alphabet {
    type Error = ConfigError;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Alphabet> for String {
    fn from(a: Alphabet) -> Self {
        a.symbols.iter().collect()
    }
}

/// Shape of minted tokens and the retry bound of the mint loop.
///
/// The keyspace (`alphabet.len() ^ length`) must vastly exceed the number of
/// live entries a map is expected to hold; the defaults (six of `1-9`, about
/// half a million tokens) suit maps scoped to a single session or request.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct TokenConfig {
    pub length: usize,
    pub alphabet: Alphabet,
    pub max_attempts: u32,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            length: 6,
            alphabet: Alphabet::default(),
            max_attempts: 10_000,
        }
    }
}

impl TokenConfig {
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    pub fn with_alphabet(mut self, alphabet: Alphabet) -> Self {
        self.alphabet = alphabet;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Number of distinct tokens this config can produce, saturating at
    /// `u128::MAX`.
    pub fn keyspace(&self) -> u128 {
        let base = self.alphabet.len() as u128;
        let exp = u32::try_from(self.length).unwrap_or(u32::MAX);
        base.checked_pow(exp).unwrap_or(u128::MAX)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.length == 0 {
            return Err(ConfigError::ZeroLength);
        }
        if self.length > MAX_TOKEN_LENGTH {
            return Err(ConfigError::LengthTooLarge {
                length: self.length,
                max: MAX_TOKEN_LENGTH,
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }

    /// True if `candidate` has the configured length and only configured
    /// symbols.
    pub fn admits(&self, candidate: &str) -> bool {
        let mut n = 0usize;
        for c in candidate.chars() {
            if !self.alphabet.contains(c) {
                return false;
            }
            n += 1;
        }
        n == self.length
    }
}

/// Supplier of fixed-length random strings over an alphabet.
///
/// Implementations used outside tests must be cryptographically
/// unpredictable: an adversary who has seen any number of tokens must not
/// be able to guess the next one.
pub trait TokenSource {
    fn next_token(&mut self, length: usize, alphabet: &Alphabet) -> String;
}

impl<F> TokenSource for F
where
    F: FnMut(usize, &Alphabet) -> String,
{
    fn next_token(&mut self, length: usize, alphabet: &Alphabet) -> String {
        self(length, alphabet)
    }
}

/// Token source drawing each symbol uniformly from a cryptographic RNG.
pub struct RngTokenSource<R> {
    rng: R,
}

/// The default source, backed by the operating system's CSPRNG.
pub type OsTokenSource = RngTokenSource<OsRng>;

impl<R: RngCore + CryptoRng> RngTokenSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl Default for RngTokenSource<OsRng> {
    fn default() -> Self {
        Self::new(OsRng)
    }
}

impl<R: RngCore + CryptoRng> TokenSource for RngTokenSource<R> {
    fn next_token(&mut self, length: usize, alphabet: &Alphabet) -> String {
        let symbols = alphabet.as_chars();
        // gen_range samples without modulo bias.
        (0..length)
            .map(|_| symbols[self.rng.gen_range(0..symbols.len())])
            .collect()
    }
}

impl<R> fmt::Debug for RngTokenSource<R> {
    // RNG state stays private.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RngTokenSource").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::collections::BTreeSet;

    #[test]
    fn alphabet_rejects_bad_input() {
        assert_eq!(Alphabet::new(""), Err(ConfigError::EmptyAlphabet));
        assert_eq!(
            Alphabet::new("7"),
            Err(ConfigError::AlphabetTooSmall { len: 1 })
        );
        assert_eq!(
            Alphabet::new("abca"),
            Err(ConfigError::DuplicateSymbol { symbol: 'a' })
        );
        let ab = Alphabet::new("ab").unwrap();
        assert_eq!(ab.len(), 2);
        assert!(!ab.is_empty());
    }

    #[test]
    fn alphabet_constants_are_valid() {
        assert_eq!(
            Alphabet::nonzero_digits(),
            Alphabet::new(Alphabet::NONZERO_DIGITS).unwrap()
        );
        assert_eq!(
            Alphabet::alphanumeric(),
            Alphabet::new(Alphabet::ALPHANUMERIC).unwrap()
        );
        assert!(!Alphabet::default().contains('0'));
    }

    #[test]
    fn config_validation() {
        let c = TokenConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.keyspace(), 9u128.pow(6));

        assert_eq!(
            c.clone().with_length(0).validate(),
            Err(ConfigError::ZeroLength)
        );
        assert_eq!(
            c.clone().with_length(MAX_TOKEN_LENGTH + 1).validate(),
            Err(ConfigError::LengthTooLarge {
                length: MAX_TOKEN_LENGTH + 1,
                max: MAX_TOKEN_LENGTH
            })
        );
        assert_eq!(
            c.with_max_attempts(0).validate(),
            Err(ConfigError::ZeroAttempts)
        );
    }

    #[test]
    fn keyspace_saturates() {
        let c = TokenConfig::default()
            .with_alphabet(Alphabet::alphanumeric())
            .with_length(MAX_TOKEN_LENGTH);
        assert_eq!(c.keyspace(), u128::MAX);
    }

    #[test]
    fn admits_checks_length_and_symbols() {
        let c = TokenConfig::default();
        assert!(c.admits("123456"));
        assert!(!c.admits("12345"));
        assert!(!c.admits("1234567"));
        assert!(!c.admits("123450"));
        assert!(!c.admits(""));
    }

    /// Invariant: RNG-backed tokens have the requested length and only use
    /// alphabet symbols.
    #[test]
    fn rng_source_respects_shape() {
        let mut src = RngTokenSource::new(ChaCha20Rng::seed_from_u64(7));
        let alphabet = Alphabet::new("xyz").unwrap();
        for _ in 0..200 {
            let t = src.next_token(10, &alphabet);
            assert_eq!(t.chars().count(), 10);
            assert!(t.chars().all(|c| alphabet.contains(c)));
        }
    }

    #[test]
    fn rng_source_covers_alphabet() {
        let mut src = RngTokenSource::new(ChaCha20Rng::seed_from_u64(1));
        let alphabet = Alphabet::nonzero_digits();
        let seen: BTreeSet<char> = (0..100)
            .flat_map(|_| src.next_token(6, &alphabet).chars().collect::<Vec<_>>())
            .collect();
        assert_eq!(seen.len(), 9);
    }

    #[test]
    fn seeded_sources_are_reproducible() {
        let alphabet = Alphabet::alphanumeric();
        let mut a = RngTokenSource::new(ChaCha20Rng::seed_from_u64(99));
        let mut b = RngTokenSource::new(ChaCha20Rng::seed_from_u64(99));
        assert_eq!(a.next_token(16, &alphabet), b.next_token(16, &alphabet));
    }

    #[test]
    fn os_source_produces_distinct_tokens() {
        let mut src = OsTokenSource::default();
        let alphabet = Alphabet::alphanumeric();
        let a = src.next_token(32, &alphabet);
        let b = src.next_token(32, &alphabet);
        assert_ne!(a, b, "32 alphanumeric symbols should not repeat");
    }

    #[test]
    fn closures_are_sources() {
        let mut n = 0u32;
        let mut src = |len: usize, _: &Alphabet| {
            n += 1;
            "1".repeat(len)
        };
        assert_eq!(src.next_token(3, &Alphabet::default()), "111");
        assert_eq!(n, 1);
    }

    #[test]
    fn token_conversions() {
        let t = IndirectToken::from("483921");
        assert_eq!(t, "483921");
        assert_eq!(t.as_str(), "483921");
        assert_eq!(t.to_string(), "483921");
        let s: String = t.clone().into();
        assert_eq!(IndirectToken::from(s), t);
        let borrowed: &str = t.borrow();
        assert_eq!(borrowed.len(), 6);
    }

    #[test]
    fn source_debug_hides_state() {
        let src = RngTokenSource::new(ChaCha20Rng::seed_from_u64(3));
        assert_eq!(format!("{src:?}"), "RngTokenSource { .. }");
    }
}
