//! Error types for reference-map operations and configuration.

use thiserror::Error;

/// Crate result alias.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors surfaced by [`ReferenceMap`](crate::ReferenceMap).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The indirect reference is empty, forged, or no longer live.
    ///
    /// Carries no payload: the rejected token is never echoed back.
    #[error("access denied")]
    InvalidIndirectReference,

    /// No unused token could be minted within the configured attempt bound.
    #[error("token keyspace exhausted after {attempts} attempts")]
    KeyspaceExhausted {
        /// Number of candidates drawn before giving up.
        attempts: u32,
    },

    /// The token configuration was rejected at construction.
    #[error("invalid token configuration: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Returns true for the access-control rejection callers should map to
    /// a generic "forbidden"/"not found" response.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::InvalidIndirectReference)
    }

    /// Returns true if the error indicates a misconfigured map rather than a
    /// bad request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::KeyspaceExhausted { .. } | Self::Config(_))
    }
}

/// Rejections produced while validating a [`TokenConfig`](crate::TokenConfig).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("alphabet is empty")]
    EmptyAlphabet,

    #[error("alphabet has {len} symbol(s), at least 2 are required")]
    AlphabetTooSmall { len: usize },

    #[error("alphabet repeats symbol {symbol:?}")]
    DuplicateSymbol { symbol: char },

    #[error("token length must be non-zero")]
    ZeroLength,

    #[error("max_attempts must be non-zero")]
    ZeroAttempts,

    #[error("token length {length} exceeds the maximum of {max}")]
    LengthTooLarge { length: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: the access-denied message is generic and never carries
    /// request data.
    #[test]
    fn access_denied_message_is_generic() {
        let e = Error::InvalidIndirectReference;
        assert_eq!(e.to_string(), "access denied");
        assert!(e.is_access_denied());
        assert!(!e.is_fatal());
    }

    #[test]
    fn config_errors_convert_and_are_fatal() {
        let e: Error = ConfigError::ZeroLength.into();
        assert!(e.is_fatal());
        assert!(!e.is_access_denied());
        assert_eq!(
            e.to_string(),
            "invalid token configuration: token length must be non-zero"
        );
        assert!(Error::KeyspaceExhausted { attempts: 3 }.is_fatal());
    }
}
