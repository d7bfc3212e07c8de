//! # Trusted Login Session
//!
//! Session and identity collaborators consumed by the trusted-login filter.
//!
//! This crate provides:
//! - **Sessions**: [`Session`] handles with an inactive → active → invalidated
//!   lifecycle
//! - **Per-request context**: [`SessionContext`], the current-session cell that
//!   is passed down a request's call chain instead of living in a global
//! - **Collaborator traits**: [`SessionManager`] to start sessions and
//!   [`UserDirectory`] to resolve external user ids
//! - **In-memory implementations** for tests and single-process deployments
//!
//! ## Example
//!
//! ```
//! use trusted_login_session::{
//!     MemorySessionManager, MemoryUserDirectory, SessionContext, SessionManager, UserDirectory,
//!     UserIdentity,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = MemorySessionManager::new();
//!     let directory = MemoryUserDirectory::with_users([UserIdentity::with_eid("alice")]);
//!
//!     let ctx = SessionContext::new(manager.start_session()?);
//!
//!     let session = manager.start_session()?;
//!     session.bind_identity(directory.resolve("alice").await?)?;
//!     session.activate()?;
//!
//!     let previous = ctx.replace(session.clone());
//!     assert_eq!(ctx.current().user_eid().as_deref(), Some("alice"));
//!
//!     ctx.replace(previous);
//!     session.invalidate();
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! - **`testutil`**: failing collaborator doubles, fixture sessions, and the
//!   `assert_session_error!` macro.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod directory;
pub mod error;
pub mod manager;
pub mod session;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod types;

pub use directory::{MemoryUserDirectory, UserDirectory};
pub use error::{BoxError, SessionError, SessionResult};
pub use manager::{MemorySessionManager, SessionManager};
pub use session::{ActivationState, Session, SessionContext};
pub use types::{SessionId, UserIdentity};
