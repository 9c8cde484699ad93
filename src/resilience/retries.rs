//! Retry logic.
//!
//! # Responsibilities
//! - Re-run a failed attempt up to `max_attempts` times
//! - Wait an exponential, capped, jittered delay between attempts
//! - Stop immediately on failures that cannot succeed on retry
//!
//! # Design Decisions
//! - REMOTE_ERROR, TIMEOUT and CONNECTION_ERROR are retried; a short-circuit is not
//! - Exhaustion surfaces the last underlying failure, never a new error kind
//! - The action records its own outcome (breaker + event log) before returning,
//!   so bookkeeping always precedes the retry decision
//! - The backoff sleep only suspends the retrying task

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::CallError;
use crate::resilience::backoff::Backoff;

/// Per-attempt information handed to the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptContext {
    /// 1-based attempt number within one `execute` call.
    pub number: u32,
    /// Backoff slept before this attempt (zero for the first).
    pub delay_before: Duration,
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Backoff::from_config(config))
    }

    /// Drive `action` until it succeeds, fails permanently, or attempts run out.
    pub async fn execute<T, F, Fut>(&self, mut action: F) -> Result<T, CallError>
    where
        F: FnMut(AttemptContext) -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        let mut ctx = AttemptContext {
            number: 1,
            delay_before: Duration::ZERO,
        };

        loop {
            let err = match action(ctx).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.is_retryable() {
                tracing::debug!(attempt = ctx.number, kind = %err.kind(), "Not retrying");
                return Err(err);
            }
            if ctx.number >= self.max_attempts {
                tracing::warn!(attempts = ctx.number, error = %err, "Retries exhausted");
                return Err(err);
            }

            let delay = self.backoff.delay(ctx.number);
            tracing::warn!(
                attempt = ctx.number,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying in {:.3} seconds",
                delay.as_secs_f64()
            );
            tokio::time::sleep(delay).await;

            ctx = AttemptContext {
                number: ctx.number + 1,
                delay_before: delay,
            };
        }
    }
}
