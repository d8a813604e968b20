//! Retrying Requester
//!
//! Runs one outbound call with bounded attempts:
//! - Exponential backoff between attempts
//! - `Retry-After` hint overrides the backoff when rate limited
//! - Aggregate error once every attempt has failed

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{RelayError, Result};
use crate::slack::ApiResponse;

/// HTTP status the platform uses for rate limiting
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    /// Upper bound for the exponential delay
    pub max_delay: Duration,
    /// Added on top of a `Retry-After` hint
    pub rate_limit_margin: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            rate_limit_margin: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Policy with the given attempt count and default delays
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// No waiting between attempts (tests, local tooling)
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            rate_limit_margin: Duration::ZERO,
        }
    }

    /// Wait before the attempt following `attempt` (1-based)
    pub fn interval(&self, attempt: u32, last_response: Option<&ApiResponse>) -> Duration {
        if let Some(secs) = last_response.and_then(|r| r.retry_after) {
            return Duration::from_secs(secs) + self.rate_limit_margin;
        }

        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Executes outbound calls under a [`RetryPolicy`]
#[derive(Debug, Clone, Default)]
pub struct RetryingRequester {
    policy: RetryPolicy,
}

impl RetryingRequester {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `call` until it yields a response that is not rate limited.
    ///
    /// Transport errors and 429 responses are retried; any other response,
    /// whatever its status, is handed back on the spot.
    pub async fn execute<F, Fut>(&self, mut call: F) -> Result<ApiResponse>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ApiResponse>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let (error, response) = match call().await {
                Ok(response) if response.status == TOO_MANY_REQUESTS => (
                    RelayError::RateLimited {
                        retry_after: response.retry_after,
                    },
                    Some(response),
                ),
                Ok(response) => {
                    if attempt > 1 {
                        debug!("Request succeeded on attempt {}", attempt);
                    }
                    return Ok(response);
                }
                Err(e) => (e, None),
            };

            if attempt < max_attempts {
                let wait = self.policy.interval(attempt, response.as_ref());
                warn!(
                    "Attempt {}/{} failed ({}), waiting {:?}",
                    attempt, max_attempts, error, wait
                );
                tokio::time::sleep(wait).await;
            }

            last_error = Some(error);
        }

        Err(RelayError::RetriesExhausted {
            attempts: max_attempts,
            source: Box::new(
                last_error.unwrap_or_else(|| RelayError::Transport("no attempt made".into())),
            ),
        })
    }
}
