//! # Trusted Login Authentication
//!
//! Lets a trusted upstream caller run a request on behalf of a user without
//! holding that user's credentials.
//!
//! The caller sends a token `HASH;USER;NONCE`, where `HASH` is the uppercase
//! hex digest of `SECRET;USER;NONCE` under a secret shared out of band. The
//! gate verifies it, starts a fresh session for `USER`, runs the request under
//! that session, and puts the original session back afterwards.
//!
//! This crate provides:
//! - **Token verification**: structural parsing and constant-time digest checks
//! - **Impersonation**: scoped session swapping with guaranteed restore
//! - **Request gate**: header / query-parameter extraction over any transport
//! - **Replay window**: optional single-use enforcement for verified tokens
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use http::Request;
//! use trusted_login_authn::{TrustedLoginConfig, TrustedLoginGate, carrier::TokenCarrier};
//! use trusted_login_session::{
//!     MemorySessionManager, MemoryUserDirectory, SessionContext, SessionManager, UserIdentity,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TrustedLoginConfig::builder().shared_secret("s3cret").build();
//! let manager = Arc::new(MemorySessionManager::new());
//! let directory = Arc::new(MemoryUserDirectory::with_users([UserIdentity::with_eid("alice")]));
//! let gate = TrustedLoginGate::new(&config, manager.clone(), directory);
//!
//! let request = Request::builder()
//!     .uri("/content")
//!     .header("X-SAKAI-TOKEN", "86D5AF258B058D74FB610904B7718338C35BB3C6;alice;9f2")
//!     .body(())?;
//! let ctx = &SessionContext::new(manager.start_session()?);
//!
//! let user = gate
//!     .handle(request, ctx, |req| async move { req.remote_user().map(str::to_owned) })
//!     .await;
//! assert_eq!(user.as_deref(), Some("alice"));
//! # Ok(())
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - **`testutil`**: token issuing helpers, gate fixtures, and the
//!   `assert_token_error!` macro.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Per-request impersonation.
pub mod binder;
/// Transport capabilities.
pub mod carrier;
/// Gate configuration.
pub mod config;
/// Authentication error types.
pub mod error;
/// Request gate.
pub mod gate;
/// Gate counters.
pub mod metrics;
/// Replay window.
pub mod replay;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;
/// Trust token parsing and verification.
pub mod token;
/// Digest algorithm validation.
pub mod validation;

// Re-export key types for convenience
pub use binder::{Binding, SessionBinder};
pub use carrier::{GatedRequest, RemoteUser, TokenCarrier};
pub use config::TrustedLoginConfig;
pub use error::{ConfigError, Result, TokenError};
pub use gate::TrustedLoginGate;
pub use token::{TokenCodec, TrustToken, decode};
pub use validation::{ACCEPTED_ALGORITHMS, DigestAlgorithm, FORBIDDEN_ALGORITHMS, validate_algorithm};
