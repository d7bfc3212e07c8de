//! Digest algorithm validation.
//!
//! Both ends of a trusted-login link must agree on the digest. SHA-1 is the
//! historical default and is what deployed issuers produce; SHA-256 is
//! accepted for links where both ends have been upgraded.
//!
//! # Security
//!
//! - `none` and the MD family are always rejected
//! - Anything not in [`ACCEPTED_ALGORITHMS`] is rejected

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use sha2::Sha256;

use crate::error::TokenError;

/// Algorithm names that are never accepted.
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "MD2", "MD5"];

/// Accepted algorithm names, in canonical form.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["SHA1", "SHA256"];

/// Digest used to bind the shared secret to a token's user and nonce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DigestAlgorithm {
    /// SHA-1, 20-byte digest.
    #[default]
    Sha1,
    /// SHA-256, 32-byte digest.
    Sha256,
}

impl DigestAlgorithm {
    /// Canonical algorithm name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
        }
    }

    /// Length of the hex-encoded digest in characters.
    #[must_use]
    pub fn hex_len(self) -> usize {
        match self {
            Self::Sha1 => 40,
            Self::Sha256 => 64,
        }
    }

    /// Computes `HEX(digest(secret ; data))` in uppercase.
    ///
    /// The secret is fed to the hasher directly so it is never copied into an
    /// intermediate buffer.
    #[must_use]
    pub fn keyed_hex_digest(self, secret: &str, separator: char, data: &str) -> String {
        let mut buf = [0u8; 4];
        let separator = separator.encode_utf8(&mut buf).as_bytes();
        match self {
            Self::Sha1 => hex::encode_upper(
                Sha1::new()
                    .chain_update(secret.as_bytes())
                    .chain_update(separator)
                    .chain_update(data.as_bytes())
                    .finalize(),
            ),
            Self::Sha256 => hex::encode_upper(
                Sha256::new()
                    .chain_update(secret.as_bytes())
                    .chain_update(separator)
                    .chain_update(data.as_bytes())
                    .finalize(),
            ),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_algorithm(s)
    }
}

/// Validates an algorithm name and returns the matching [`DigestAlgorithm`].
///
/// Names are matched case-insensitively and a single dash is ignored, so
/// `SHA-1`, `sha1` and `SHA1` are equivalent.
///
/// # Errors
///
/// Returns [`TokenError::UnsupportedAlgorithm`] if the name is forbidden or
/// not in [`ACCEPTED_ALGORITHMS`].
///
/// # Examples
///
/// ```
/// use trusted_login_authn::validation::{DigestAlgorithm, validate_algorithm};
///
/// assert_eq!(validate_algorithm("SHA-1").unwrap(), DigestAlgorithm::Sha1);
/// assert_eq!(validate_algorithm("sha256").unwrap(), DigestAlgorithm::Sha256);
/// assert!(validate_algorithm("MD5").is_err());
/// ```
pub fn validate_algorithm(name: &str) -> Result<DigestAlgorithm, TokenError> {
    let normalized = name.trim().replacen('-', "", 1).to_ascii_uppercase();

    if FORBIDDEN_ALGORITHMS.iter().any(|forbidden| forbidden.eq_ignore_ascii_case(&normalized)) {
        return Err(TokenError::unsupported_algorithm(format!(
            "Algorithm '{name}' is not allowed for security reasons"
        )));
    }

    match normalized.as_str() {
        "SHA1" => Ok(DigestAlgorithm::Sha1),
        "SHA256" => Ok(DigestAlgorithm::Sha256),
        _ => Err(TokenError::unsupported_algorithm(format!(
            "Algorithm '{name}' is not in accepted list ({})",
            ACCEPTED_ALGORITHMS.join(", ")
        ))),
    }
}
