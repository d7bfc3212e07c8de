//! Sessions and the per-request current-session cell.
//!
//! # Lifecycle
//!
//! ```text
//! ┌─────────────┐  activate  ┌─────────────┐  invalidate  ┌─────────────┐
//! │  Inactive   │───────────►│   Active    │─────────────►│ Invalidated │
//! │ (anonymous  │            │             │              │ (terminal)  │
//! │  or bound)  │            │             │              │             │
//! └──────┬──────┘            └─────────────┘              └─────────────┘
//!        │                    invalidate                         ▲
//!        └───────────────────────────────────────────────────────┘
//! ```
//!
//! A [`Session`] is a shared handle: clones observe the same state. The
//! [`SessionContext`] holds whichever session the current request is acting
//! as. Each request owns its own context; nothing here is process-global.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::{
    error::{SessionError, SessionResult},
    types::{SessionId, UserIdentity},
};

/// Activation state of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationState {
    /// Created but not yet marked active.
    #[default]
    Inactive,
    /// In use by a request.
    Active,
    /// Terminal. The session must not be reused.
    Invalidated,
}

#[derive(Debug, Default)]
struct SessionState {
    identity: Option<UserIdentity>,
    activation: ActivationState,
    invalidated_at: Option<DateTime<Utc>>,
}

type ReleaseHook = Box<dyn Fn(SessionId) + Send + Sync>;

struct SessionInner {
    id: SessionId,
    created_at: DateTime<Utc>,
    state: RwLock<SessionState>,
    on_release: Option<ReleaseHook>,
}

/// Handle to a session owned by a [`SessionManager`](crate::SessionManager).
///
/// Cloning is cheap and every clone refers to the same underlying session.
/// Equality is identity: two handles are equal only if they point at the same
/// session instance.
///
/// # Example
///
/// ```
/// use trusted_login_session::{ActivationState, Session, SessionId, UserIdentity};
///
/// let session = Session::new(SessionId::from(1));
/// assert!(session.is_anonymous());
///
/// session.bind_identity(UserIdentity::with_eid("alice")).unwrap();
/// session.activate().unwrap();
/// assert_eq!(session.user_eid().as_deref(), Some("alice"));
///
/// assert!(session.invalidate());
/// assert_eq!(session.activation_state(), ActivationState::Invalidated);
/// assert!(session.activate().is_err());
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Creates an inactive, anonymous session.
    #[must_use]
    pub fn new(id: SessionId) -> Self {
        Self::build(id, None)
    }

    /// Creates an inactive, anonymous session that calls `on_release` once,
    /// right after it is invalidated.
    ///
    /// Managers use this to forget sessions that can no longer be used. The
    /// hook runs after the session's own lock is released, so it may inspect
    /// the session.
    #[must_use]
    pub fn with_release_hook(
        id: SessionId,
        on_release: impl Fn(SessionId) + Send + Sync + 'static,
    ) -> Self {
        Self::build(id, Some(Box::new(on_release)))
    }

    fn build(id: SessionId, on_release: Option<ReleaseHook>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id,
                created_at: Utc::now(),
                state: RwLock::new(SessionState::default()),
                on_release,
            }),
        }
    }

    /// Creates an active session already bound to `identity`.
    ///
    /// This is the shape of a caller's ordinary logged-in session.
    #[must_use]
    pub fn authenticated(id: SessionId, identity: UserIdentity) -> Self {
        let session = Self::new(id);
        {
            let mut state = session.inner.state.write();
            state.identity = Some(identity);
            state.activation = ActivationState::Active;
        }
        session
    }

    /// Returns the session id.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    /// Returns when the session was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// Returns when the session was invalidated, if it has been.
    #[must_use]
    pub fn invalidated_at(&self) -> Option<DateTime<Utc>> {
        self.inner.state.read().invalidated_at
    }

    /// Returns the bound identity, or `None` for an anonymous session.
    #[must_use]
    pub fn identity(&self) -> Option<UserIdentity> {
        self.inner.state.read().identity.clone()
    }

    /// Returns the external id of the bound identity.
    #[must_use]
    pub fn user_eid(&self) -> Option<String> {
        self.inner.state.read().identity.as_ref().map(|user| user.eid.clone())
    }

    /// Returns `true` if no identity is bound.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.inner.state.read().identity.is_none()
    }

    /// Returns the current activation state.
    #[must_use]
    pub fn activation_state(&self) -> ActivationState {
        self.inner.state.read().activation
    }

    /// Returns `true` if the session is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.activation_state() == ActivationState::Active
    }

    /// Binds the session to `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Invalidated`] if the session was invalidated.
    pub fn bind_identity(&self, identity: UserIdentity) -> SessionResult<()> {
        let mut state = self.inner.state.write();
        if state.activation == ActivationState::Invalidated {
            return Err(SessionError::invalidated(self.inner.id));
        }
        state.identity = Some(identity);
        Ok(())
    }

    /// Marks the session active.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Invalidated`] if the session was invalidated.
    pub fn activate(&self) -> SessionResult<()> {
        let mut state = self.inner.state.write();
        if state.activation == ActivationState::Invalidated {
            return Err(SessionError::invalidated(self.inner.id));
        }
        state.activation = ActivationState::Active;
        Ok(())
    }

    /// Invalidates the session and drops its identity.
    ///
    /// Idempotent. Returns `true` only for the call that performed the
    /// transition; only that call runs the release hook.
    pub fn invalidate(&self) -> bool {
        {
            let mut state = self.inner.state.write();
            if state.activation == ActivationState::Invalidated {
                return false;
            }
            state.activation = ActivationState::Invalidated;
            state.identity = None;
            state.invalidated_at = Some(Utc::now());
        }
        if let Some(on_release) = &self.inner.on_release {
            on_release(self.inner.id);
        }
        true
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Session {}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("user_eid", &state.identity.as_ref().map(|user| user.eid.as_str()))
            .field("activation", &state.activation)
            .finish()
    }
}

/// The "current session" for a single request.
///
/// A context is created per inbound request and passed down the call chain by
/// reference. Substituting the current session only affects this context, so
/// concurrent requests never observe each other's identity.
///
/// # Example
///
/// ```
/// use trusted_login_session::{Session, SessionContext, SessionId};
///
/// let original = Session::new(SessionId::from(1));
/// let ctx = SessionContext::new(original.clone());
///
/// let previous = ctx.replace(Session::new(SessionId::from(2)));
/// assert_eq!(previous, original);
/// assert_eq!(ctx.current().id(), SessionId::from(2));
/// ```
pub struct SessionContext {
    current: Mutex<Session>,
}

impl SessionContext {
    /// Creates a context whose current session is `session`.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self { current: Mutex::new(session) }
    }

    /// Returns a handle to the current session.
    #[must_use]
    pub fn current(&self) -> Session {
        self.current.lock().clone()
    }

    /// Installs `session` as current and returns the one it replaced.
    pub fn replace(&self, session: Session) -> Session {
        std::mem::replace(&mut *self.current.lock(), session)
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext").field("current", &*self.current.lock()).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn alice() -> UserIdentity {
        UserIdentity::builder().id("u-1").eid("alice").build()
    }

    #[test]
    fn new_session_is_inactive_and_anonymous() {
        let session = Session::new(SessionId::from(1));
        assert_eq!(session.activation_state(), ActivationState::Inactive);
        assert!(session.is_anonymous());
        assert!(session.user_eid().is_none());
        assert!(session.invalidated_at().is_none());
    }

    #[test]
    fn authenticated_session_is_active_and_bound() {
        let session = Session::authenticated(SessionId::from(2), alice());
        assert!(session.is_active());
        assert_eq!(session.identity(), Some(alice()));
    }

    #[test]
    fn clones_share_state() {
        let session = Session::new(SessionId::from(3));
        let clone = session.clone();
        clone.bind_identity(alice()).unwrap();
        assert_eq!(session.user_eid().as_deref(), Some("alice"));
        assert_eq!(session, clone);
    }

    #[test]
    fn distinct_sessions_with_same_id_are_not_equal() {
        assert_ne!(Session::new(SessionId::from(4)), Session::new(SessionId::from(4)));
    }

    #[test]
    fn invalidate_is_idempotent_and_clears_identity() {
        let session = Session::authenticated(SessionId::from(5), alice());
        assert!(session.invalidate());
        assert!(!session.invalidate());
        assert!(session.is_anonymous());
        assert!(session.invalidated_at().is_some());
    }

    #[rstest]
    #[case::bind(true)]
    #[case::activate(false)]
    fn invalidated_session_rejects_transitions(#[case] bind: bool) {
        let session = Session::new(SessionId::from(6));
        session.invalidate();

        let result = if bind { session.bind_identity(alice()) } else { session.activate() };
        assert!(matches!(result, Err(SessionError::Invalidated { id }) if id == SessionId::from(6)));
        assert_eq!(session.activation_state(), ActivationState::Invalidated);
    }

    #[test]
    fn release_hook_runs_once_on_invalidation() {
        let released = Arc::new(Mutex::new(Vec::new()));
        let session = Session::with_release_hook(SessionId::from(7), {
            let released = Arc::clone(&released);
            move |id| released.lock().push(id)
        });

        session.activate().unwrap();
        assert!(released.lock().is_empty());

        assert!(session.invalidate());
        assert!(!session.clone().invalidate());
        assert_eq!(*released.lock(), vec![SessionId::from(7)]);
    }

    #[test]
    fn context_replace_returns_previous() {
        let first = Session::new(SessionId::from(10));
        let second = Session::new(SessionId::from(11));
        let ctx = SessionContext::new(first.clone());

        let previous = ctx.replace(second.clone());
        assert_eq!(previous, first);
        assert_eq!(ctx.current(), second);
    }

    #[test]
    fn debug_output_names_user_but_not_internal_id() {
        let session = Session::authenticated(SessionId::from(12), alice());
        let rendered = format!("{session:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("u-1"));
    }
}
