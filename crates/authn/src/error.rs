//! Authentication error types.
//!
//! Every failure in this crate resolves to "treat the request as if no token
//! was sent". The variants exist so callers can log and count failures
//! precisely, not so they can be surfaced to clients.

use thiserror::Error;

/// Trust-token verification errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; new variants may be added in
/// future minor releases. Downstream match expressions must include a
/// wildcard arm (`_ =>`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TokenError {
    /// The token is missing a separator or has an empty segment.
    #[error("Malformed token: {reason}")]
    Malformed {
        /// Which structural rule the token broke.
        reason: &'static str,
    },

    /// The supplied hash does not match the digest computed from the secret.
    #[error("Token digest mismatch")]
    DigestMismatch,

    /// The configured digest algorithm is not supported.
    #[error("Unsupported digest algorithm: {message}")]
    UnsupportedAlgorithm {
        /// Description of the rejected algorithm.
        message: String,
    },

    /// No shared secret is configured, so no token can verify.
    #[error("No shared secret configured")]
    MissingSecret,

    /// The token bytes are not valid text.
    #[error("Invalid token encoding: {message}")]
    InvalidEncoding {
        /// Description of the decoding failure.
        message: String,
    },

    /// The token was already presented inside the replay window.
    #[error("Token replayed")]
    Replayed,
}

/// Log level a rejected token should be reported at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Caller-side problem: bad, stale or forged token.
    Warning,
    /// Deployment defect: the filter cannot verify anything as configured.
    Error,
}

impl TokenError {
    /// Creates a new `Malformed` error.
    #[must_use]
    pub fn malformed(reason: &'static str) -> Self {
        Self::Malformed { reason }
    }

    /// Creates a new `DigestMismatch` error.
    #[must_use]
    pub fn digest_mismatch() -> Self {
        Self::DigestMismatch
    }

    /// Creates a new `UnsupportedAlgorithm` error.
    #[must_use]
    pub fn unsupported_algorithm(message: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm { message: message.into() }
    }

    /// Creates a new `MissingSecret` error.
    #[must_use]
    pub fn missing_secret() -> Self {
        Self::MissingSecret
    }

    /// Creates a new `InvalidEncoding` error.
    #[must_use]
    pub fn invalid_encoding(message: impl Into<String>) -> Self {
        Self::InvalidEncoding { message: message.into() }
    }

    /// Creates a new `Replayed` error.
    #[must_use]
    pub fn replayed() -> Self {
        Self::Replayed
    }

    /// Returns the level this error should be logged at.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::UnsupportedAlgorithm { .. } | Self::MissingSecret => Severity::Error,
            _ => Severity::Warning,
        }
    }

    /// Short, stable label for metrics and structured logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => "malformed",
            Self::DigestMismatch => "digest_mismatch",
            Self::UnsupportedAlgorithm { .. } => "unsupported_algorithm",
            Self::MissingSecret => "missing_secret",
            Self::InvalidEncoding { .. } => "invalid_encoding",
            Self::Replayed => "replayed",
        }
    }
}

/// Invalid filter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A required text field is empty.
    #[error("{field} must not be empty")]
    Empty {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A numeric or duration field is below its minimum.
    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        /// Name of the offending field.
        field: &'static str,
        /// Minimum accepted value.
        min: String,
        /// Value that was supplied.
        value: String,
    },

    /// The digest algorithm name is not accepted.
    #[error("Invalid algorithm: {0}")]
    Algorithm(#[source] TokenError),
}

/// Result type alias for token operations.
pub type Result<T> = std::result::Result<T, TokenError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::error::Error as _;

    use rstest::rstest;

    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            TokenError::malformed("missing separator").to_string(),
            "Malformed token: missing separator"
        );
        assert_eq!(TokenError::digest_mismatch().to_string(), "Token digest mismatch");
        assert_eq!(TokenError::missing_secret().to_string(), "No shared secret configured");
        assert_eq!(
            TokenError::unsupported_algorithm("MD5").to_string(),
            "Unsupported digest algorithm: MD5"
        );
    }

    #[rstest]
    #[case::malformed(TokenError::malformed("x"), Severity::Warning)]
    #[case::mismatch(TokenError::digest_mismatch(), Severity::Warning)]
    #[case::encoding(TokenError::invalid_encoding("bad utf-8"), Severity::Warning)]
    #[case::replayed(TokenError::replayed(), Severity::Warning)]
    #[case::algorithm(TokenError::unsupported_algorithm("MD5"), Severity::Error)]
    #[case::secret(TokenError::missing_secret(), Severity::Error)]
    fn test_severity(#[case] err: TokenError, #[case] expected: Severity) {
        assert_eq!(err.severity(), expected);
    }

    #[test]
    fn test_kind_labels_are_distinct() {
        let kinds = [
            TokenError::malformed("x").kind(),
            TokenError::digest_mismatch().kind(),
            TokenError::unsupported_algorithm("x").kind(),
            TokenError::missing_secret().kind(),
            TokenError::invalid_encoding("x").kind(),
            TokenError::replayed().kind(),
        ];
        let unique: std::collections::HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }

    #[test]
    fn test_config_error_display_and_source() {
        let err = ConfigError::BelowMinimum {
            field: "replay_capacity",
            min: "1".into(),
            value: "0".into(),
        };
        assert_eq!(err.to_string(), "replay_capacity must be at least 1, got 0");

        let err = ConfigError::Algorithm(TokenError::unsupported_algorithm("MD5"));
        let source = err.source().expect("algorithm error keeps its source");
        assert_eq!(source.to_string(), "Unsupported digest algorithm: MD5");
    }
}
