//! User directory lookups.
//!
//! The filter resolves the user named in a verified token to a canonical
//! [`UserIdentity`] before binding it to a session. Production directories
//! typically sit on a database or LDAP, so the trait is async.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    error::{SessionError, SessionResult},
    types::UserIdentity,
};

/// Resolves external user ids to identity records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolves `eid` to its canonical identity.
    ///
    /// # Errors
    ///
    /// - [`SessionError::UnknownUser`] if no user has this external id
    /// - [`SessionError::Unavailable`] if the directory cannot be queried
    async fn resolve(&self, eid: &str) -> SessionResult<UserIdentity>;
}

#[async_trait]
impl<T: UserDirectory + ?Sized> UserDirectory for Arc<T> {
    async fn resolve(&self, eid: &str) -> SessionResult<UserIdentity> {
        (**self).resolve(eid).await
    }
}

/// In-memory [`UserDirectory`] keyed by external id.
///
/// # Example
///
/// ```
/// use trusted_login_session::{MemoryUserDirectory, UserDirectory, UserIdentity};
///
/// #[tokio::main]
/// async fn main() {
///     let directory = MemoryUserDirectory::new();
///     directory.insert(UserIdentity::builder().id("u-1").eid("alice").build());
///
///     let alice = directory.resolve("alice").await.unwrap();
///     assert_eq!(alice.id, "u-1");
///     assert!(directory.resolve("ghost").await.is_err());
/// }
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryUserDirectory {
    users: Arc<RwLock<HashMap<String, UserIdentity>>>,
}

impl MemoryUserDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory holding `users`.
    #[must_use]
    pub fn with_users(users: impl IntoIterator<Item = UserIdentity>) -> Self {
        let directory = Self::new();
        for user in users {
            directory.insert(user);
        }
        directory
    }

    /// Adds or replaces a user, returning the previous record for that eid.
    pub fn insert(&self, user: UserIdentity) -> Option<UserIdentity> {
        self.users.write().insert(user.eid.clone(), user)
    }

    /// Removes a user by external id.
    pub fn remove(&self, eid: &str) -> Option<UserIdentity> {
        self.users.write().remove(eid)
    }

    /// Number of users in the directory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Returns `true` if the directory holds no users.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    #[tracing::instrument(skip(self))]
    async fn resolve(&self, eid: &str) -> SessionResult<UserIdentity> {
        self.users.read().get(eid).cloned().ok_or_else(|| SessionError::unknown_user(eid))
    }
}
