//! Single-flight coordination for access token renewal.
//!
//! Any number of requests can observe an expired access token at the same
//! moment; only one refresh call may go out. Followers await a shared handle
//! to the in-flight renewal instead of polling, and every waiter's wait is
//! bounded by a timeout.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::Mutex;
use std::time::Duration;

/// Why a renewal attempt failed. `Clone` because the outcome fans out to
/// every request that joined the attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalError {
    /// The refresh endpoint rejected the token. Terminal: the session is over.
    Unauthorized(String),
    /// The refresh call never completed (network, server error).
    Transport(String),
    /// This waiter gave up before the in-flight renewal settled.
    Timeout,
}

impl std::fmt::Display for RenewalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenewalError::Unauthorized(msg) => write!(f, "Renewal rejected: {}", msg),
            RenewalError::Transport(msg) => write!(f, "Renewal failed: {}", msg),
            RenewalError::Timeout => write!(f, "Timed out waiting for token renewal"),
        }
    }
}

impl std::error::Error for RenewalError {}

type RenewalFuture = Shared<BoxFuture<'static, Result<(), RenewalError>>>;

/// Default bound on how long a request waits for an in-flight renewal.
pub const DEFAULT_RENEWAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Single-flight gate around the refresh call.
///
/// The slot holds the currently running renewal as a [`Shared`] future.
/// Joiners clone the handle; once the future has settled, the next caller
/// replaces it with a fresh attempt, so a failed renewal never poisons
/// later ones.
pub struct RenewalGate {
    slot: Mutex<Option<RenewalFuture>>,
    timeout: Duration,
}

impl RenewalGate {
    pub fn new(timeout: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            timeout,
        }
    }

    /// Join the in-flight renewal, or start a new one with `start` if none is
    /// running. Waits at most the configured timeout; timing out abandons
    /// this waiter but leaves the renewal running for others.
    pub async fn run<F>(&self, start: F) -> Result<(), RenewalError>
    where
        F: FnOnce() -> BoxFuture<'static, Result<(), RenewalError>>,
    {
        let fut = {
            let mut slot = self.slot.lock().unwrap();
            match slot.as_ref() {
                // peek() is Some once the shared future has settled
                Some(existing) if existing.peek().is_none() => existing.clone(),
                _ => {
                    let fresh = start().shared();
                    *slot = Some(fresh.clone());
                    fresh
                }
            }
        };

        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(RenewalError::Timeout),
        }
    }
}
