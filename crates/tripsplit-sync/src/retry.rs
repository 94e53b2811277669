//! Bounded retry with backoff, and idempotency keys.
//!
//! Retry applies to idempotent reads only. Writes are never blindly
//! retried: expense inserts instead carry a client-generated idempotency
//! key so the remote can deduplicate, and everything else is surfaced to
//! the caller on first failure.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{Result, SyncError};

/// Retry budget for transient read failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each attempt after that.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }
}

/// Run an idempotent read, retrying transient failures within the policy's
/// budget. Non-transient errors (`NotFound`, validation) return immediately.
pub async fn retry_read<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = policy.base_delay;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                warn!(what, attempt, error = %e, "transient read failure, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// A fresh client-generated idempotency key.
pub fn idempotency_key() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
