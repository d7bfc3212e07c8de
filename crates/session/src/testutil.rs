//! Shared test utilities for session collaborators.
//!
//! Feature-gated behind `testutil` so the failing doubles never reach a
//! production build.
//!
//! ```toml
//! [dev-dependencies]
//! trusted-login-session = { path = "../session", features = ["testutil"] }
//! ```

use async_trait::async_trait;

use crate::{
    directory::{MemoryUserDirectory, UserDirectory},
    error::{SessionError, SessionResult},
    manager::SessionManager,
    session::Session,
    types::{SessionId, UserIdentity},
};

/// A [`SessionManager`] whose `start_session` always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableSessionManager;

impl SessionManager for UnavailableSessionManager {
    fn start_session(&self) -> SessionResult<Session> {
        Err(SessionError::unavailable("session store offline"))
    }
}

/// A [`UserDirectory`] whose lookups always fail with `Unavailable`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableDirectory;

#[async_trait]
impl UserDirectory for UnavailableDirectory {
    async fn resolve(&self, _eid: &str) -> SessionResult<UserIdentity> {
        Err(SessionError::unavailable("directory offline"))
    }
}

/// Builds a directory containing one user per eid, with `id` set to `"id-{eid}"`.
#[must_use]
pub fn directory_with(eids: &[&str]) -> MemoryUserDirectory {
    MemoryUserDirectory::with_users(
        eids.iter().map(|eid| UserIdentity::builder().id(format!("id-{eid}")).eid(*eid).build()),
    )
}

/// Creates an active session bound to `eid`, as a logged-in caller would hold.
#[must_use]
pub fn logged_in_session(id: i64, eid: &str) -> Session {
    Session::authenticated(
        SessionId::from(id),
        UserIdentity::builder().id(format!("id-{eid}")).eid(eid).build(),
    )
}

/// Creates an anonymous active session.
#[must_use]
pub fn anonymous_session(id: i64) -> Session {
    let session = Session::new(SessionId::from(id));
    // A fresh session is never invalidated, so activation cannot fail.
    let _ = session.activate();
    session
}

/// Asserts that a [`SessionResult`] is an `Err` matching the given variant.
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use trusted_login_session::{assert_session_error, SessionError, SessionResult};
///
/// let result: SessionResult<()> = Err(SessionError::unknown_user("ghost"));
/// assert_session_error!(result, UnknownUser);
/// ```
#[macro_export]
macro_rules! assert_session_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::error::SessionError::$variant { .. })),
            "expected SessionError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
}
