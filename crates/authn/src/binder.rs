//! Per-request impersonation.
//!
//! [`SessionBinder`] swaps a freshly started, impersonated session into a
//! request's [`SessionContext`] and guarantees that the prior session is put
//! back and the impersonated one invalidated when the request is done. The
//! guarantee is carried by [`ImpersonationGuard`]'s `Drop`, so it holds on
//! normal return, on an error returned by the downstream handler, on panic
//! unwind, and when the request future is dropped mid-flight.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use trusted_login_authn::binder::{Binding, SessionBinder};
//! use trusted_login_session::{
//!     MemorySessionManager, MemoryUserDirectory, Session, SessionContext, SessionId,
//!     UserIdentity,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let directory = MemoryUserDirectory::with_users([UserIdentity::with_eid("alice")]);
//! let binder = SessionBinder::new(Arc::new(MemorySessionManager::new()), Arc::new(directory));
//!
//! let original = Session::new(SessionId::from(1));
//! let ctx = &SessionContext::new(original.clone());
//!
//! let seen = binder
//!     .bind_and_run(ctx, "alice", |binding| async move {
//!         assert!(matches!(binding, Binding::Impersonated(_)));
//!         ctx.current().user_eid()
//!     })
//!     .await;
//!
//! assert_eq!(seen.as_deref(), Some("alice"));
//! assert_eq!(ctx.current(), original);
//! # }
//! ```

use std::{fmt, future::Future, sync::Arc};

use trusted_login_session::{Session, SessionContext, SessionManager, UserDirectory, UserIdentity};

/// Identity a request runs under after the trusted-login filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// No usable token: the request runs under whatever session it had.
    Unverified,
    /// The token named the user already logged in; nothing was swapped.
    SelfAsserted,
    /// The request runs under a fresh session for this user.
    Impersonated(UserIdentity),
    /// The token verified but impersonation could not be set up.
    Skipped,
}

impl Binding {
    /// The impersonated identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&UserIdentity> {
        match self {
            Self::Impersonated(identity) => Some(identity),
            _ => None,
        }
    }

    /// Returns `true` if the request runs under an impersonated session.
    #[must_use]
    pub fn is_impersonated(&self) -> bool {
        matches!(self, Self::Impersonated(_))
    }
}

/// Why a verified token did not lead to impersonation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The directory has no such user.
    UnknownUser,
    /// The directory or session manager failed.
    Unavailable,
}

/// Result of [`SessionBinder::impersonate`]. Keep it alive for as long as the
/// request should run as the impersonated user.
#[must_use = "dropping an Impersonation ends it immediately"]
pub enum Impersonation<'a> {
    /// The claimed user is already the current user.
    SelfAsserted,
    /// No session was swapped in.
    Skipped(SkipReason),
    /// An impersonated session is current until the guard drops.
    Active(ImpersonationGuard<'a>),
}

impl Impersonation<'_> {
    /// The [`Binding`] this impersonation gives the request.
    #[must_use]
    pub fn binding(&self) -> Binding {
        match self {
            Self::SelfAsserted => Binding::SelfAsserted,
            Self::Skipped(_) => Binding::Skipped,
            Self::Active(guard) => Binding::Impersonated(guard.identity().clone()),
        }
    }
}

impl fmt::Debug for Impersonation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfAsserted => f.write_str("SelfAsserted"),
            Self::Skipped(reason) => f.debug_tuple("Skipped").field(reason).finish(),
            Self::Active(guard) => f.debug_tuple("Active").field(guard).finish(),
        }
    }
}

/// A started session that is invalidated when dropped.
struct SessionLease {
    session: Session,
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        if self.session.invalidate() {
            tracing::trace!(session_id = %self.session.id(), "Invalidated impersonated session");
        }
    }
}

/// Restores the prior session on drop, then invalidates the impersonated one.
pub struct ImpersonationGuard<'a> {
    ctx: &'a SessionContext,
    previous: Option<Session>,
    identity: UserIdentity,
    // Dropped after `Drop::drop` has restored `previous`.
    lease: SessionLease,
}

impl ImpersonationGuard<'_> {
    /// The impersonated identity.
    #[must_use]
    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    /// The impersonated session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.lease.session
    }
}

impl Drop for ImpersonationGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            let displaced = self.ctx.replace(previous);
            if displaced != self.lease.session {
                tracing::warn!(
                    session_id = %self.lease.session.id(),
                    displaced_id = %displaced.id(),
                    "Current session was replaced during impersonation; restoring prior session anyway"
                );
            }
        }
    }
}

impl fmt::Debug for ImpersonationGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImpersonationGuard")
            .field("user", &self.identity.eid)
            .field("session", &self.lease.session.id())
            .finish_non_exhaustive()
    }
}

/// Creates, installs and tears down impersonated sessions.
#[derive(Clone)]
pub struct SessionBinder {
    manager: Arc<dyn SessionManager>,
    directory: Arc<dyn UserDirectory>,
}

impl SessionBinder {
    /// Creates a binder over the given collaborators.
    #[must_use]
    pub fn new(manager: Arc<dyn SessionManager>, directory: Arc<dyn UserDirectory>) -> Self {
        Self { manager, directory }
    }

    /// Makes `claimed_user` the current user of `ctx` until the returned
    /// value is dropped.
    ///
    /// Never fails: an unknown user or a collaborator failure is logged and
    /// reported as [`Impersonation::Skipped`], leaving `ctx` untouched.
    pub async fn impersonate<'a>(
        &self,
        ctx: &'a SessionContext,
        claimed_user: &str,
    ) -> Impersonation<'a> {
        if ctx.current().user_eid().as_deref() == Some(claimed_user) {
            tracing::debug!(user = claimed_user, "Token names the current user; not impersonating");
            return Impersonation::SelfAsserted;
        }

        let lease = match self.manager.start_session() {
            Ok(session) => SessionLease { session },
            Err(err) => {
                tracing::error!(user = claimed_user, error = %err, "Failed to start impersonated session");
                return Impersonation::Skipped(SkipReason::Unavailable);
            },
        };

        let identity = match self.directory.resolve(claimed_user).await {
            Ok(identity) => identity,
            Err(err) if err.is_unknown_user() => {
                tracing::warn!(user = claimed_user, "Trusted token names an unknown user; not impersonating");
                return Impersonation::Skipped(SkipReason::UnknownUser);
            },
            Err(err) => {
                tracing::error!(user = claimed_user, error = %err, "Failed to resolve trusted-login user");
                return Impersonation::Skipped(SkipReason::Unavailable);
            },
        };

        let session = &lease.session;
        if let Err(err) = session.bind_identity(identity.clone()).and_then(|()| session.activate()) {
            tracing::error!(user = claimed_user, error = %err, "Failed to activate impersonated session");
            return Impersonation::Skipped(SkipReason::Unavailable);
        }

        let previous = ctx.replace(session.clone());
        tracing::debug!(
            user = claimed_user,
            session_id = %session.id(),
            previous_id = %previous.id(),
            "Impersonating trusted-login user"
        );
        Impersonation::Active(ImpersonationGuard { ctx, previous: Some(previous), identity, lease })
    }

    /// Runs `downstream` as `claimed_user` and returns its output unchanged.
    ///
    /// `downstream` receives the [`Binding`] it runs under. Whatever happens
    /// inside it, `ctx` holds its original session again once this future
    /// completes or is dropped.
    #[tracing::instrument(skip_all, fields(user = claimed_user))]
    pub async fn bind_and_run<F, Fut, T>(
        &self,
        ctx: &SessionContext,
        claimed_user: &str,
        downstream: F,
    ) -> T
    where
        F: FnOnce(Binding) -> Fut,
        Fut: Future<Output = T>,
    {
        let impersonation = self.impersonate(ctx, claimed_user).await;
        let output = downstream(impersonation.binding()).await;
        drop(impersonation);
        output
    }
}

impl fmt::Debug for SessionBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBinder").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use trusted_login_session::{
        ActivationState, MemorySessionManager, SessionId,
        testutil::{UnavailableDirectory, UnavailableSessionManager, anonymous_session, directory_with, logged_in_session},
    };

    use super::*;

    fn binder_with(manager: &MemorySessionManager) -> SessionBinder {
        SessionBinder::new(Arc::new(manager.clone()), Arc::new(directory_with(&["alice", "bob"])))
    }

    #[tokio::test]
    async fn test_impersonation_swaps_and_restores() {
        let manager = MemorySessionManager::new();
        let binder = binder_with(&manager);
        let original = anonymous_session(100);
        let ctx = &SessionContext::new(original.clone());

        let impersonated = binder
            .bind_and_run(ctx, "alice", |binding| async move {
                assert_eq!(binding.identity().map(|u| u.eid.as_str()), Some("alice"));
                let current = ctx.current();
                assert!(current.is_active());
                current
            })
            .await;

        assert_eq!(ctx.current(), original);
        assert_eq!(impersonated.activation_state(), ActivationState::Invalidated);
        assert!(impersonated.identity().is_none());
        assert!(original.is_active());
        assert_eq!(manager.started(), 1);
    }

    #[tokio::test]
    async fn test_self_assertion_starts_no_session() {
        let manager = MemorySessionManager::new();
        let binder = binder_with(&manager);
        let original = logged_in_session(7, "alice");
        let ctx = &SessionContext::new(original.clone());

        let binding = binder.bind_and_run(ctx, "alice", |binding| async move { binding }).await;

        assert_eq!(binding, Binding::SelfAsserted);
        assert_eq!(manager.started(), 0);
        assert_eq!(ctx.current(), original);
    }

    #[tokio::test]
    async fn test_unknown_user_skips_and_invalidates_started_session() {
        let manager = MemorySessionManager::new();
        let binder = binder_with(&manager);
        let original = anonymous_session(1);
        let ctx = &SessionContext::new(original.clone());

        let (binding, current) = binder
            .bind_and_run(ctx, "ghost", |binding| async move { (binding, ctx.current()) })
            .await;

        assert_eq!(binding, Binding::Skipped);
        assert_eq!(current, original);
        assert_eq!(manager.started(), 1);
        assert!(manager.get(SessionId::from(1)).is_none(), "started session was invalidated");
    }

    #[tokio::test]
    async fn test_directory_failure_skips() {
        let manager = MemorySessionManager::new();
        let binder = SessionBinder::new(Arc::new(manager.clone()), Arc::new(UnavailableDirectory));
        let ctx = &SessionContext::new(anonymous_session(1));

        let impersonation = binder.impersonate(ctx, "alice").await;
        assert!(matches!(impersonation, Impersonation::Skipped(SkipReason::Unavailable)));
        drop(impersonation);

        assert!(manager.get(SessionId::from(1)).is_none(), "started session was invalidated");
    }

    #[tokio::test]
    async fn test_session_manager_failure_skips() {
        let binder = SessionBinder::new(
            Arc::new(UnavailableSessionManager),
            Arc::new(directory_with(&["alice"])),
        );
        let original = anonymous_session(1);
        let ctx = &SessionContext::new(original.clone());

        let binding = binder.bind_and_run(ctx, "alice", |binding| async move { binding }).await;
        assert_eq!(binding, Binding::Skipped);
        assert_eq!(ctx.current(), original);
    }

    #[tokio::test]
    async fn test_downstream_error_is_returned_unchanged_after_restore() {
        let manager = MemorySessionManager::new();
        let binder = binder_with(&manager);
        let original = anonymous_session(1);
        let ctx = &SessionContext::new(original.clone());

        let result: Result<(), &str> =
            binder.bind_and_run(ctx, "bob", |_| async move { Err("downstream failed") }).await;

        assert_eq!(result, Err("downstream failed"));
        assert_eq!(ctx.current(), original);
        assert!(manager.get(SessionId::from(1)).is_none(), "started session was invalidated");
    }

    #[tokio::test]
    async fn test_guard_restores_even_if_downstream_swapped_session() {
        let manager = MemorySessionManager::new();
        let binder = binder_with(&manager);
        let original = anonymous_session(1);
        let ctx = &SessionContext::new(original.clone());

        binder
            .bind_and_run(ctx, "alice", |_| async move {
                ctx.replace(anonymous_session(99));
            })
            .await;

        assert_eq!(ctx.current(), original);
    }

    #[tokio::test]
    async fn test_dropping_impersonation_restores() {
        let manager = MemorySessionManager::new();
        let binder = binder_with(&manager);
        let original = anonymous_session(1);
        let ctx = &SessionContext::new(original.clone());

        let impersonation = binder.impersonate(ctx, "alice").await;
        let Impersonation::Active(guard) = &impersonation else {
            panic!("expected active impersonation, got {impersonation:?}");
        };
        let session = guard.session().clone();
        assert_eq!(ctx.current(), session);

        drop(impersonation);
        assert_eq!(ctx.current(), original);
        assert!(!session.is_active());
    }
}
