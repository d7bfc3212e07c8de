//! Optional single-use window for trust tokens.
//!
//! Trust tokens carry no expiry, so by default a captured token can be
//! presented again indefinitely. When a replay window is configured the gate
//! remembers the hash of every verified token for that long and rejects a
//! second presentation with [`TokenError::Replayed`].
//!
//! # Usage
//!
//! ```no_run
//! use std::time::Duration;
//! use trusted_login_authn::replay::InMemoryReplayDetector;
//!
//! // Remember up to 10_000 tokens for five minutes each
//! let detector = InMemoryReplayDetector::new(10_000, Duration::from_secs(300));
//! ```
//!
//! # Design
//!
//! - **Opt-in**: no detector is installed unless `replay_window` is set.
//! - **Keyed by hash**: the hash already commits to user and nonce, and it is the only segment that
//!   is not caller-chosen free text.
//! - **Capacity-bounded**: LRU eviction caps memory beyond the per-entry TTL. An evicted token can
//!   be replayed once more.

use std::time::Duration;

use async_trait::async_trait;
use moka::{future::Cache, policy::EvictionPolicy};

use crate::error::TokenError;

/// Tracks verified token hashes and rejects duplicates.
#[async_trait]
pub trait ReplayDetector: Send + Sync {
    /// Records `hash` as seen, failing if it was already recorded.
    ///
    /// The check and the mark are a single atomic step, so two concurrent
    /// presentations of one token cannot both pass.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Replayed`] if the hash is still inside its window.
    async fn check_and_mark(&self, hash: &str) -> Result<(), TokenError>;
}

/// In-memory replay detector backed by a [`moka::future::Cache`].
///
/// # Thread Safety
///
/// `InMemoryReplayDetector` is `Send + Sync` and safe for concurrent use
/// from multiple async tasks.
pub struct InMemoryReplayDetector {
    seen: Cache<String, ()>,
}

impl InMemoryReplayDetector {
    /// Creates a detector that remembers each hash for `window`.
    ///
    /// # Arguments
    ///
    /// * `max_capacity` — Maximum number of hashes tracked at once. When exceeded, the
    ///   least-recently-used entry is evicted.
    /// * `window` — How long a verified token stays single-use.
    #[must_use]
    pub fn new(max_capacity: u64, window: Duration) -> Self {
        let seen = Cache::builder()
            .max_capacity(max_capacity)
            .eviction_policy(EvictionPolicy::lru())
            .time_to_live(window)
            .build();
        Self { seen }
    }
}

impl std::fmt::Debug for InMemoryReplayDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryReplayDetector")
            .field("tracked", &self.seen.entry_count())
            .finish()
    }
}

#[async_trait]
impl ReplayDetector for InMemoryReplayDetector {
    async fn check_and_mark(&self, hash: &str) -> Result<(), TokenError> {
        let entry = self.seen.entry(hash.to_owned()).or_insert(()).await;
        if entry.is_fresh() { Ok(()) } else { Err(TokenError::replayed()) }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tokio::task::JoinSet;

    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_first_presentation_accepted() {
        let detector = InMemoryReplayDetector::new(100, HOUR);
        assert!(detector.check_and_mark("AAAA").await.is_ok());
    }

    #[tokio::test]
    async fn test_second_presentation_rejected() {
        let detector = InMemoryReplayDetector::new(100, HOUR);
        detector.check_and_mark("BBBB").await.unwrap();

        let result = detector.check_and_mark("BBBB").await;
        assert_eq!(result, Err(TokenError::Replayed));
    }

    #[tokio::test]
    async fn test_different_hashes_accepted() {
        let detector = InMemoryReplayDetector::new(100, HOUR);
        detector.check_and_mark("hash-a").await.unwrap();
        assert!(detector.check_and_mark("hash-b").await.is_ok());
    }

    #[tokio::test]
    async fn test_hash_accepted_again_after_window() {
        let detector = InMemoryReplayDetector::new(100, Duration::from_millis(50));
        detector.check_and_mark("short").await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        detector.seen.run_pending_tasks().await;

        assert!(detector.check_and_mark("short").await.is_ok());
    }

    #[tokio::test]
    async fn test_capacity_eviction() {
        let detector = InMemoryReplayDetector::new(2, HOUR);

        detector.check_and_mark("h1").await.unwrap();
        detector.check_and_mark("h2").await.unwrap();
        detector.check_and_mark("h3").await.unwrap();
        detector.seen.run_pending_tasks().await;

        assert!(detector.seen.entry_count() <= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_presentations_admit_exactly_one() {
        let detector = Arc::new(InMemoryReplayDetector::new(100, HOUR));
        let mut tasks = JoinSet::new();
        for _ in 0..16 {
            let detector = Arc::clone(&detector);
            tasks.spawn(async move { detector.check_and_mark("race").await.is_ok() });
        }

        let mut admitted = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }
}
