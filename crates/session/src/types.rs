//! Identity types shared by sessions and user directories.

use serde::{Deserialize, Serialize};

/// Defines an `i64` newtype with the standard identifier traits.
///
/// Each generated type derives `Copy`, `Eq`, `Hash`, `Ord`, serializes
/// transparently, converts to and from `i64`, and displays as the inner value.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Identifier assigned to a session by its [`SessionManager`](crate::SessionManager).
    ///
    /// # Examples
    ///
    /// ```
    /// use trusted_login_session::SessionId;
    ///
    /// let id = SessionId::from(42);
    /// assert_eq!(i64::from(id), 42);
    /// assert_eq!(id.to_string(), "42");
    /// ```
    SessionId
);

/// Canonical identity record returned by a [`UserDirectory`](crate::UserDirectory).
///
/// The `eid` is the external identifier callers put in trust tokens. The `id`
/// is the directory's internal identifier, which may differ.
///
/// # Example
///
/// ```
/// use trusted_login_session::UserIdentity;
///
/// let alice = UserIdentity::builder().id("u-1001").eid("alice").build();
/// assert_eq!(alice.eid, "alice");
///
/// // Directories that do not distinguish the two use the same value.
/// let bob = UserIdentity::with_eid("bob");
/// assert_eq!(bob.id, bob.eid);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct UserIdentity {
    /// Internal user id.
    #[builder(into)]
    pub id: String,

    /// External user id, as carried in trust tokens.
    #[builder(into)]
    pub eid: String,
}

impl UserIdentity {
    /// Creates an identity whose internal id equals its external id.
    #[must_use]
    pub fn with_eid(eid: impl Into<String>) -> Self {
        let eid = eid.into();
        Self { id: eid.clone(), eid }
    }
}
