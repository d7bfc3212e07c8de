//! Counters for trusted-login outcomes.
//!
//! # Examples
//!
//! ```
//! use trusted_login_authn::error::TokenError;
//! use trusted_login_authn::metrics::GateMetrics;
//!
//! let metrics = GateMetrics::new();
//! metrics.record_request();
//! metrics.record_rejected(&TokenError::digest_mismatch());
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.requests, 1);
//! assert_eq!(snapshot.rejected_digest_mismatch, 1);
//! assert_eq!(snapshot.total_rejected(), 1);
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::error::TokenError;

/// How a verified token ended up being handled by the binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// The token named the user already logged in.
    SelfAsserted,
    /// The request ran under an impersonated session.
    Impersonated,
    /// The token named a user the directory does not know.
    UnknownUser,
    /// The directory or session manager failed.
    Unavailable,
}

/// Snapshot of gate counters at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, bon::Builder)]
pub struct GateMetricsSnapshot {
    /// Requests seen by the gate.
    #[builder(default)]
    pub requests: u64,
    /// Requests without a token.
    #[builder(default)]
    pub tokens_absent: u64,
    /// Tokens that verified.
    #[builder(default)]
    pub tokens_verified: u64,

    /// Structurally invalid tokens.
    #[builder(default)]
    pub rejected_malformed: u64,
    /// Tokens whose hash did not match.
    #[builder(default)]
    pub rejected_digest_mismatch: u64,
    /// Tokens that were not valid text.
    #[builder(default)]
    pub rejected_encoding: u64,
    /// Tokens presented again inside the replay window.
    #[builder(default)]
    pub rejected_replayed: u64,
    /// Tokens that could not be checked because the gate is misconfigured.
    #[builder(default)]
    pub rejected_config: u64,

    /// Tokens naming the already logged-in user.
    #[builder(default)]
    pub self_asserted: u64,
    /// Requests run under an impersonated session.
    #[builder(default)]
    pub impersonated: u64,
    /// Tokens naming an unknown user.
    #[builder(default)]
    pub unknown_user: u64,
    /// Impersonations abandoned because a collaborator failed.
    #[builder(default)]
    pub unavailable: u64,
}

impl GateMetricsSnapshot {
    /// Returns the total number of rejected tokens.
    #[must_use]
    pub fn total_rejected(&self) -> u64 {
        self.rejected_malformed
            + self.rejected_digest_mismatch
            + self.rejected_encoding
            + self.rejected_replayed
            + self.rejected_config
    }

    /// Fraction of presented tokens that were rejected (0.0 to 1.0).
    #[must_use]
    pub fn rejection_rate(&self) -> f64 {
        let presented = self.tokens_verified + self.total_rejected();
        if presented == 0 { 0.0 } else { self.total_rejected() as f64 / presented as f64 }
    }
}

#[derive(Default)]
struct GateMetricsInner {
    requests: AtomicU64,
    tokens_absent: AtomicU64,
    tokens_verified: AtomicU64,

    rejected_malformed: AtomicU64,
    rejected_digest_mismatch: AtomicU64,
    rejected_encoding: AtomicU64,
    rejected_replayed: AtomicU64,
    rejected_config: AtomicU64,

    self_asserted: AtomicU64,
    impersonated: AtomicU64,
    unknown_user: AtomicU64,
    unavailable: AtomicU64,
}

/// Gate metrics collector.
///
/// Cloning shares the same counters.
#[derive(Clone, Default)]
pub struct GateMetrics {
    inner: Arc<GateMetricsInner>,
}

impl GateMetrics {
    /// Creates a collector with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request entering the gate.
    pub fn record_request(&self) {
        self.inner.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a request without a token.
    pub fn record_absent(&self) {
        self.inner.tokens_absent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a verified token.
    pub fn record_verified(&self) {
        self.inner.tokens_verified.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a rejected token by error category.
    pub fn record_rejected(&self, err: &TokenError) {
        let counter = match err {
            TokenError::Malformed { .. } => &self.inner.rejected_malformed,
            TokenError::DigestMismatch => &self.inner.rejected_digest_mismatch,
            TokenError::InvalidEncoding { .. } => &self.inner.rejected_encoding,
            TokenError::Replayed => &self.inner.rejected_replayed,
            TokenError::UnsupportedAlgorithm { .. } | TokenError::MissingSecret => {
                &self.inner.rejected_config
            },
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Records how a verified token was bound.
    pub fn record_bind(&self, outcome: BindOutcome) {
        let counter = match outcome {
            BindOutcome::SelfAsserted => &self.inner.self_asserted,
            BindOutcome::Impersonated => &self.inner.impersonated,
            BindOutcome::UnknownUser => &self.inner.unknown_user,
            BindOutcome::Unavailable => &self.inner.unavailable,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a snapshot of the counters.
    #[must_use]
    pub fn snapshot(&self) -> GateMetricsSnapshot {
        let inner = &self.inner;
        GateMetricsSnapshot::builder()
            .requests(inner.requests.load(Ordering::Relaxed))
            .tokens_absent(inner.tokens_absent.load(Ordering::Relaxed))
            .tokens_verified(inner.tokens_verified.load(Ordering::Relaxed))
            .rejected_malformed(inner.rejected_malformed.load(Ordering::Relaxed))
            .rejected_digest_mismatch(inner.rejected_digest_mismatch.load(Ordering::Relaxed))
            .rejected_encoding(inner.rejected_encoding.load(Ordering::Relaxed))
            .rejected_replayed(inner.rejected_replayed.load(Ordering::Relaxed))
            .rejected_config(inner.rejected_config.load(Ordering::Relaxed))
            .self_asserted(inner.self_asserted.load(Ordering::Relaxed))
            .impersonated(inner.impersonated.load(Ordering::Relaxed))
            .unknown_user(inner.unknown_user.load(Ordering::Relaxed))
            .unavailable(inner.unavailable.load(Ordering::Relaxed))
            .build()
    }

    /// Resets every counter to zero.
    pub fn reset(&self) {
        let inner = &self.inner;
        for counter in [
            &inner.requests,
            &inner.tokens_absent,
            &inner.tokens_verified,
            &inner.rejected_malformed,
            &inner.rejected_digest_mismatch,
            &inner.rejected_encoding,
            &inner.rejected_replayed,
            &inner.rejected_config,
            &inner.self_asserted,
            &inner.impersonated,
            &inner.unknown_user,
            &inner.unavailable,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl std::fmt::Debug for GateMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("GateMetrics").field(&self.snapshot()).finish()
    }
}
