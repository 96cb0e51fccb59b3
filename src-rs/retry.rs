//! Bounded retries with exponential backoff for provider calls.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = single attempt)
    pub max_retries: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 250,
            max_delay_ms: 4000,
            exponential_base: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay_ms(mut self, delay_ms: u64) -> Self {
        self.initial_delay_ms = delay_ms;
        self
    }

    /// Delay before attempt `attempt` (1-based count of attempts already made).
    /// Adds up to 50% jitter on top of the capped exponential delay.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base = self.initial_delay_ms as f64 * self.exponential_base.powi((attempt - 1) as i32);
        let capped = base.min(self.max_delay_ms as f64);
        let jitter = rand::thread_rng().gen_range(0.0..0.5) * capped;
        Duration::from_millis((capped + jitter) as u64)
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or the
/// policy is exhausted. Returns the last result.
pub async fn with_retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_retries + 1;
    let mut attempts = 0;
    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempts < max_attempts && is_retryable(&err) => {
                let delay = policy.delay_for_attempt(attempts);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    label, attempts, max_attempts, err, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
