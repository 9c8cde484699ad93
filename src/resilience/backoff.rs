//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Delay schedule between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub cap: Duration,
    pub jitter_span: Duration,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration, jitter_span: Duration) -> Self {
        Self { base, cap, jitter_span }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.cap_delay_ms),
            Duration::from_millis(config.jitter_span_ms),
        )
    }

    /// Deterministic part of the delay before retry `k` (k >= 1):
    /// `min(base * 2^(k-1), cap)`.
    pub fn base_delay(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.checked_pow(retry - 1).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .unwrap_or(self.cap)
            .min(self.cap)
    }

    /// Delay before retry `k`, with uniform jitter in `[0, jitter_span]`.
    pub fn delay(&self, retry: u32) -> Duration {
        self.delay_with(retry, &mut rand::thread_rng())
    }

    pub fn delay_with<R: Rng>(&self, retry: u32, rng: &mut R) -> Duration {
        let base = self.base_delay(retry);
        if retry == 0 {
            return base;
        }
        let span = self.jitter_span.as_micros() as u64;
        let jitter = if span > 0 { rng.gen_range(0..=span) } else { 0 };
        base + Duration::from_micros(jitter)
    }
}
