//! Nonce tracking for replay attack prevention.
//!
//! Every signed UMA message carries a single-use nonce and a timestamp. The
//! [`NonceValidator`] capability decides whether a (nonce, timestamp) pair is
//! fresh, and callers reject the message on `false` without learning which
//! check failed.
//!
//! # Security
//!
//! - Check-and-record is a single atomic step; a check-then-record sequence
//!   would let a replayed nonce slip through between the two.
//! - A stale timestamp and a reused nonce produce the same outcome.
//! - A nonce recorded by a verification the caller later abandons stays
//!   recorded.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{Result, UmaError};

/// Capability interface for nonce bookkeeping.
///
/// The in-memory implementation below suits a single process; production
/// deployments back this with durable or shared storage.
#[async_trait]
pub trait NonceValidator: Send + Sync {
    /// Checks a (nonce, timestamp) pair and records the nonce if fresh.
    ///
    /// Returns `Ok(false)` without recording when the timestamp is older
    /// than the store's floor or the nonce was already recorded. Both cases
    /// are indistinguishable to the caller. Returns `Ok(true)` after
    /// atomically recording the nonce otherwise.
    async fn check_and_save_nonce(&self, nonce: &str, timestamp_secs: i64) -> Result<bool>;

    /// Deletes entries older than `timestamp_ms` and raises the floor to it.
    /// This is the only way the floor increases.
    async fn purge_nonces_older_than(&self, timestamp_ms: i64) -> Result<()>;
}

struct NonceState {
    // nonce -> timestamp in milliseconds
    seen: HashMap<String, i64>,
    floor_ms: i64,
}

/// In-memory reference implementation of [`NonceValidator`].
pub struct InMemoryNonceValidator {
    state: Mutex<NonceState>,
}

impl InMemoryNonceValidator {
    /// Create a validator that rejects timestamps older than
    /// `oldest_valid_ms` (unix milliseconds).
    pub fn new(oldest_valid_ms: i64) -> Self {
        Self {
            state: Mutex::new(NonceState {
                seen: HashMap::new(),
                floor_ms: oldest_valid_ms,
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, NonceState>> {
        self.state
            .lock()
            .map_err(|_| UmaError::Internal("nonce store lock poisoned".to_string()))
    }
}

#[async_trait]
impl NonceValidator for InMemoryNonceValidator {
    async fn check_and_save_nonce(&self, nonce: &str, timestamp_secs: i64) -> Result<bool> {
        let timestamp_ms = timestamp_secs.saturating_mul(1000);
        let mut state = self.lock()?;
        if timestamp_ms < state.floor_ms {
            return Ok(false);
        }
        if state.seen.contains_key(nonce) {
            return Ok(false);
        }
        state.seen.insert(nonce.to_string(), timestamp_ms);
        Ok(true)
    }

    async fn purge_nonces_older_than(&self, timestamp_ms: i64) -> Result<()> {
        let mut state = self.lock()?;
        state.seen.retain(|_, seen_ms| *seen_ms >= timestamp_ms);
        state.floor_ms = state.floor_ms.max(timestamp_ms);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_nonce_accepted() {
        let validator = InMemoryNonceValidator::new(0);
        assert!(validator.check_and_save_nonce("n1", 1_700_000_000).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_nonce_rejected() {
        let validator = InMemoryNonceValidator::new(0);
        assert!(validator.check_and_save_nonce("n1", 1_700_000_000).await.unwrap());
        assert!(!validator.check_and_save_nonce("n1", 1_700_000_000).await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_timestamp_rejected_and_not_recorded() {
        let floor_ms = 1_700_000_000_000;
        let validator = InMemoryNonceValidator::new(floor_ms);

        // One second below the floor.
        assert!(!validator.check_and_save_nonce("n1", 1_699_999_999).await.unwrap());

        // The rejected nonce was not recorded, so it stays usable with a
        // valid timestamp.
        assert!(validator.check_and_save_nonce("n1", 1_700_000_001).await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_raises_floor() {
        let validator = InMemoryNonceValidator::new(0);
        assert!(validator.check_and_save_nonce("old", 100).await.unwrap());
        assert!(validator.check_and_save_nonce("new", 200).await.unwrap());

        validator.purge_nonces_older_than(150_000).await.unwrap();

        // Purged entries stay rejected through the raised floor.
        assert!(!validator.check_and_save_nonce("old", 100).await.unwrap());
        // Entries at or above the cutoff survive.
        assert!(!validator.check_and_save_nonce("new", 200).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_single_winner() {
        use std::sync::Arc;

        let validator = Arc::new(InMemoryNonceValidator::new(0));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let validator = validator.clone();
            handles.push(tokio::spawn(async move {
                validator.check_and_save_nonce("contested", 1_700_000_000).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1, "exactly one concurrent use may succeed");
    }
}
