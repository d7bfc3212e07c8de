//! Session and directory error types.
//!
//! Every collaborator behind the trusted-login filter maps its internal
//! failures onto [`SessionError`]. The filter itself never surfaces these to
//! the client; it degrades to "no impersonation" and logs.
//!
//! # Example
//!
//! ```
//! use trusted_login_session::{SessionError, SessionResult, UserIdentity};
//!
//! fn lookup(eid: &str) -> SessionResult<UserIdentity> {
//!     Err(SessionError::unknown_user(eid))
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;

use crate::types::SessionId;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for session and directory operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised by session managers and user directories.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; new variants may be added in
/// future minor releases. Downstream match expressions must include a
/// wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// The user directory has no record for the external id.
    #[error("Unknown user: {eid}")]
    UnknownUser {
        /// External id that failed to resolve.
        eid: String,
    },

    /// The session has already been invalidated and cannot change state.
    #[error("Session invalidated: {id}")]
    Invalidated {
        /// Id of the invalidated session.
        id: SessionId,
    },

    /// The backing service could not be reached or refused the request.
    #[error("Session service unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<BoxError>,
    },
}

impl SessionError {
    /// Creates a new `UnknownUser` error for the given external id.
    #[must_use]
    pub fn unknown_user(eid: impl Into<String>) -> Self {
        Self::UnknownUser { eid: eid.into() }
    }

    /// Creates a new `Invalidated` error for the given session.
    #[must_use]
    pub fn invalidated(id: SessionId) -> Self {
        Self::Invalidated { id }
    }

    /// Creates a new `Unavailable` error with the given message.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable { message: message.into(), source: None }
    }

    /// Creates a new `Unavailable` error with a message and source error.
    #[must_use]
    pub fn unavailable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Unavailable { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Returns `true` if this error means the named user does not exist.
    #[must_use]
    pub fn is_unknown_user(&self) -> bool {
        matches!(self, Self::UnknownUser { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(SessionError::unknown_user("ghost").to_string(), "Unknown user: ghost");
        assert_eq!(
            SessionError::invalidated(SessionId::from(7)).to_string(),
            "Session invalidated: 7"
        );
        assert_eq!(
            SessionError::unavailable("directory offline").to_string(),
            "Session service unavailable: directory offline"
        );
    }

    #[test]
    fn test_unavailable_preserves_source_chain() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = SessionError::unavailable_with_source("directory offline", inner);

        let source = err.source().expect("source chain must be preserved");
        assert_eq!(source.to_string(), "refused");
    }

    #[test]
    fn test_is_unknown_user() {
        assert!(SessionError::unknown_user("ghost").is_unknown_user());
        assert!(!SessionError::unavailable("x").is_unknown_user());
    }
}
