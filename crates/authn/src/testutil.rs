//! Shared test utilities for trusted-login testing.
//!
//! This module provides helpers for issuing tokens the way an upstream trusted
//! caller would, for corrupting them, and for assembling a gate over in-memory
//! collaborators. It is feature-gated behind `testutil` to prevent leaking
//! into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! trusted-login-authn = { path = "../authn", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use trusted_login_authn::testutil::{issue_token, tamper_hash};
//! ```

use std::sync::Arc;

use http::Request;
use trusted_login_session::{MemorySessionManager, MemoryUserDirectory, testutil::directory_with};

use crate::{
    config::TrustedLoginConfig, gate::TrustedLoginGate, token::SEPARATOR,
    validation::DigestAlgorithm,
};

/// Shared secret used by the fixtures.
pub const TEST_SECRET: &str = "s3cret";

/// Issues a SHA-1 token for `user`, as an upstream trusted caller would.
#[must_use]
pub fn issue_token(secret: &str, user: &str, nonce: &str) -> String {
    issue_token_with(DigestAlgorithm::Sha1, secret, user, nonce)
}

/// Issues a token with the given digest algorithm.
#[must_use]
pub fn issue_token_with(algorithm: DigestAlgorithm, secret: &str, user: &str, nonce: &str) -> String {
    let data = format!("{user}{SEPARATOR}{nonce}");
    let hash = algorithm.keyed_hex_digest(secret, SEPARATOR, &data);
    format!("{hash}{SEPARATOR}{data}")
}

/// Returns `token` with the hash character at `index` replaced by a different
/// hex digit.
///
/// # Panics
///
/// Panics if `index` is outside the hash segment.
#[must_use]
pub fn tamper_hash(token: &str, index: usize) -> String {
    let hash_len = token.find(SEPARATOR).expect("token has a separator");
    assert!(index < hash_len, "index {index} is outside the {hash_len}-character hash");

    let mut bytes = token.as_bytes().to_vec();
    bytes[index] = if bytes[index] == b'0' { b'1' } else { b'0' };
    String::from_utf8(bytes).expect("replacing an ASCII byte keeps UTF-8")
}

/// A GET request carrying `token` in the trusted-login header.
#[must_use]
pub fn request_with_header(token: &str) -> Request<()> {
    Request::builder()
        .uri("/")
        .header(crate::config::DEFAULT_HEADER_NAME, token)
        .body(())
        .expect("valid test request")
}

/// A GET request carrying `token` in the trusted-login query parameter.
#[must_use]
pub fn request_with_param(token: &str) -> Request<()> {
    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair(crate::config::DEFAULT_PARAM_NAME, token)
        .finish();
    Request::builder().uri(format!("/?{query}")).body(()).expect("valid test request")
}

/// A gate over in-memory collaborators, with handles to inspect them.
pub struct GateFixture {
    /// The gate under test.
    pub gate: Arc<TrustedLoginGate>,
    /// Session manager the gate starts sessions from.
    pub manager: MemorySessionManager,
    /// Directory the gate resolves users against.
    pub directory: MemoryUserDirectory,
}

/// Builds a gate with [`TEST_SECRET`] whose directory knows `users`.
#[must_use]
pub fn gate_fixture(users: &[&str]) -> GateFixture {
    gate_fixture_with(&TrustedLoginConfig::builder().shared_secret(TEST_SECRET).build(), users)
}

/// Builds a gate from `config` whose directory knows `users`.
#[must_use]
pub fn gate_fixture_with(config: &TrustedLoginConfig, users: &[&str]) -> GateFixture {
    let manager = MemorySessionManager::new();
    let directory = directory_with(users);
    let gate = TrustedLoginGate::new(config, Arc::new(manager.clone()), Arc::new(directory.clone()));
    GateFixture { gate: Arc::new(gate), manager, directory }
}

/// Asserts that a token `Result` is an `Err` matching the given variant.
///
/// Uses struct-pattern matching so it works for unit, tuple, and struct
/// variants.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use trusted_login_authn::{assert_token_error, error::TokenError};
///
/// let result: Result<String, TokenError> = Err(TokenError::digest_mismatch());
/// assert_token_error!(result, DigestMismatch);
/// assert_token_error!(result, DigestMismatch, "wrong secret must not verify");
/// ```
#[macro_export]
macro_rules! assert_token_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::error::TokenError::$variant { .. })),
            "expected TokenError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
    ($result:expr, $variant:ident, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::TokenError::$variant { .. })),
            "{}: expected TokenError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            $result,
        );
    };
}
