//! Session creation.
//!
//! The trusted-login filter only ever needs to start a fresh session; reading
//! and installing the current session is done through the per-request
//! [`SessionContext`](crate::SessionContext), not through the manager.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicI64, AtomicU64, Ordering},
    },
};

use parking_lot::RwLock;

use crate::{error::SessionResult, session::Session, types::SessionId};

/// Creates sessions on behalf of the filter.
///
/// Implementations must be safe to share across concurrently running
/// requests. Starting a session is synchronous and bounded in time.
pub trait SessionManager: Send + Sync {
    /// Starts a new inactive, anonymous session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Unavailable`](crate::SessionError::Unavailable)
    /// if the manager cannot allocate a session.
    fn start_session(&self) -> SessionResult<Session>;
}

impl<T: SessionManager + ?Sized> SessionManager for Arc<T> {
    fn start_session(&self) -> SessionResult<Session> {
        (**self).start_session()
    }
}

/// In-memory [`SessionManager`] for tests and single-process deployments.
///
/// Ids are allocated from a monotonic counter. Started sessions are kept in a
/// registry until they are invalidated, so the registry only ever holds
/// sessions that are still usable.
///
/// # Thread Safety
///
/// Uses atomics for counters and a [`parking_lot::RwLock`] for the registry.
///
/// # Example
///
/// ```
/// use trusted_login_session::{MemorySessionManager, SessionManager};
///
/// let manager = MemorySessionManager::new();
/// let session = manager.start_session().unwrap();
/// assert_eq!(manager.started(), 1);
/// assert_eq!(manager.live_sessions(), 1);
///
/// session.invalidate();
/// assert_eq!(manager.live_sessions(), 0);
/// assert!(manager.get(session.id()).is_none());
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemorySessionManager {
    next_id: Arc<AtomicI64>,
    started: Arc<AtomicU64>,
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
}

impl MemorySessionManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions started so far.
    #[must_use]
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    /// Number of started sessions that have not been invalidated.
    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.sessions.read().len()
    }

    /// Looks up a started session by id. Invalidated sessions are not found.
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<Session> {
        self.sessions.read().get(&id).cloned()
    }
}

impl SessionManager for MemorySessionManager {
    #[tracing::instrument(skip(self))]
    fn start_session(&self) -> SessionResult<Session> {
        let id = SessionId::from(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let registry = Arc::downgrade(&self.sessions);
        let session = Session::with_release_hook(id, move |id| {
            if let Some(registry) = registry.upgrade() {
                registry.write().remove(&id);
            }
        });
        self.sessions.write().insert(id, session.clone());
        self.started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(session_id = %id, "Started session");
        Ok(session)
    }
}
