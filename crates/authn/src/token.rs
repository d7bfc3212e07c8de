//! Trust token parsing and verification.
//!
//! A trust token has the shape `HASH;USER;NONCE` where
//!
//! ```text
//! HASH = HEX(digest(shared_secret ; USER ; NONCE))
//! ```
//!
//! rendered in uppercase, two characters per digest byte. The nonce only
//! varies the digest per request; it is never checked for uniqueness here
//! (see [`crate::replay`] for the optional replay window).
//!
//! # Example
//!
//! ```
//! use trusted_login_authn::token::{TokenCodec, decode};
//! use trusted_login_authn::validation::DigestAlgorithm;
//!
//! let token = "86D5AF258B058D74FB610904B7718338C35BB3C6;alice;9f2";
//! assert_eq!(decode(token, "s3cret").unwrap(), "alice");
//! assert!(decode(token, "wrong").is_err());
//!
//! let codec = TokenCodec::new("s3cret", DigestAlgorithm::Sha1).unwrap();
//! let verified = codec.decode(token).unwrap();
//! assert_eq!(verified.nonce(), "9f2");
//! ```

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::{
    error::{Result, TokenError},
    validation::DigestAlgorithm,
};

/// Field separator inside a token.
pub const SEPARATOR: char = ';';

/// Longest raw token accepted, in bytes.
pub const MAX_TOKEN_LEN: usize = 4096;

/// A token split into its hash and signed data, not yet verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawToken<'a> {
    hash: &'a str,
    data: &'a str,
}

impl<'a> RawToken<'a> {
    /// Splits `raw` on the first separator.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`] if the token is oversized, has no
    /// separator, or either side of it is empty.
    pub fn parse(raw: &'a str) -> Result<Self> {
        if raw.len() > MAX_TOKEN_LEN {
            return Err(TokenError::malformed("token exceeds maximum length"));
        }
        let (hash, data) =
            raw.split_once(SEPARATOR).ok_or_else(|| TokenError::malformed("missing separator"))?;
        if hash.is_empty() {
            return Err(TokenError::malformed("empty hash segment"));
        }
        if data.is_empty() {
            return Err(TokenError::malformed("empty data segment"));
        }
        Ok(Self { hash, data })
    }

    /// The hash segment as supplied.
    #[must_use]
    pub fn hash(&self) -> &'a str {
        self.hash
    }

    /// Everything after the first separator (`USER;NONCE`).
    #[must_use]
    pub fn data(&self) -> &'a str {
        self.data
    }

    /// Checks the hash against `secret` and splits out user and nonce.
    ///
    /// # Errors
    ///
    /// - [`TokenError::DigestMismatch`] if the hash does not match
    /// - [`TokenError::Malformed`] if the verified data has no user separator
    ///   or an empty user
    pub fn verify(&self, secret: &str, algorithm: DigestAlgorithm) -> Result<TrustToken<'a>> {
        let candidate = Zeroizing::new(algorithm.keyed_hex_digest(secret, SEPARATOR, self.data));
        if !bool::from(self.hash.as_bytes().ct_eq(candidate.as_bytes())) {
            return Err(TokenError::digest_mismatch());
        }

        let (user, nonce) = self
            .data
            .split_once(SEPARATOR)
            .ok_or_else(|| TokenError::malformed("missing user separator"))?;
        if user.is_empty() {
            return Err(TokenError::malformed("empty user"));
        }
        Ok(TrustToken { hash: self.hash, user, nonce })
    }
}

/// A verified trust token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustToken<'a> {
    hash: &'a str,
    user: &'a str,
    nonce: &'a str,
}

impl<'a> TrustToken<'a> {
    /// The verified hash segment.
    #[must_use]
    pub fn hash(&self) -> &'a str {
        self.hash
    }

    /// The user the caller is acting for.
    #[must_use]
    pub fn user(&self) -> &'a str {
        self.user
    }

    /// The per-request nonce.
    #[must_use]
    pub fn nonce(&self) -> &'a str {
        self.nonce
    }
}

/// Verifies tokens against one shared secret and digest algorithm.
///
/// The secret is held in [`Zeroizing`] memory and never printed by `Debug`.
#[derive(Clone)]
pub struct TokenCodec {
    secret: Zeroizing<String>,
    algorithm: DigestAlgorithm,
}

impl TokenCodec {
    /// Creates a codec.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::MissingSecret`] if `secret` is empty.
    pub fn new(secret: impl Into<String>, algorithm: DigestAlgorithm) -> Result<Self> {
        let secret = Zeroizing::new(secret.into());
        if secret.is_empty() {
            return Err(TokenError::missing_secret());
        }
        Ok(Self { secret, algorithm })
    }

    /// The digest algorithm in use.
    #[must_use]
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Parses and verifies `raw`.
    ///
    /// # Errors
    ///
    /// Returns any [`TokenError`] from [`RawToken::parse`] or
    /// [`RawToken::verify`].
    pub fn decode<'a>(&self, raw: &'a str) -> Result<TrustToken<'a>> {
        RawToken::parse(raw)?.verify(&self.secret, self.algorithm)
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// Verifies a SHA-1 token and returns the user it names.
///
/// # Errors
///
/// Returns [`TokenError::MissingSecret`] for an empty secret, otherwise any
/// error from [`TokenCodec::decode`].
pub fn decode(raw: &str, secret: &str) -> Result<String> {
    let codec = TokenCodec::new(secret, DigestAlgorithm::Sha1)?;
    Ok(codec.decode(raw)?.user().to_owned())
}
