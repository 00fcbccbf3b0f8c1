//! Bounded retry with exponential backoff for session operations.

use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::types::PunterError;

/// Attempt count, initial delay and multiplicative backoff.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    pub initial_delay_ms: u64,
    /// Delay multiplier applied after every failed attempt (at least 1.0).
    pub backoff: f64,
}

impl RetryPolicy {
    pub fn new(attempts: u32, initial_delay: Duration, backoff: f64) -> Self {
        Self {
            attempts,
            initial_delay_ms: initial_delay.as_millis() as u64,
            backoff,
        }
    }

    /// Defaults used for logging in: 3 tries, 2s, ×4.
    pub fn login() -> Self {
        Self::new(3, Duration::from_secs(2), 4.0)
    }

    /// Defaults used for league switching: 3 tries, 5s, ×2.
    pub fn league() -> Self {
        Self::new(3, Duration::from_secs(5), 2.0)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Run `attempt` until it succeeds, the error is not retryable, or the
    /// attempts are used up. The last error is returned unchanged.
    pub async fn run<T, F, Fut, P>(
        &self,
        op: &'static str,
        retry_if: P,
        mut attempt: F,
    ) -> Result<T, PunterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PunterError>>,
        P: Fn(&PunterError) -> bool,
    {
        let max_attempts = self.attempts.max(1);
        let mut delay = self.initial_delay();
        let mut tries = 1;

        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if tries < max_attempts && retry_if(&e) => {
                    warn!(
                        op,
                        attempt = tries,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.mul_f64(self.backoff.max(1.0));
                    tries += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
