//! Per-request fault decision.
//!
//! Each request independently draws a latency and whether to fail. Failures
//! pay the same latency as successes.

use std::time::Duration;

use rand::Rng;
use serde::Serialize;

use crate::config::SimulatorConfig;

/// Fault simulator behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaultPolicy {
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Probability of answering with a server error.
    pub failure_probability: f64,
    /// Probability that the drawn delay is applied at all.
    pub slow_probability: f64,
}

/// What the simulator will do with one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub delay: Duration,
    pub fail: bool,
}

impl FaultPolicy {
    pub fn from_config(config: &SimulatorConfig) -> Self {
        Self {
            min_delay: Duration::from_millis(config.min_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            failure_probability: config.failure_probability,
            slow_probability: config.slow_probability,
        }
    }

    /// A policy that answers immediately and never fails.
    pub fn healthy() -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            failure_probability: 0.0,
            slow_probability: 0.0,
        }
    }

    pub fn decide<R: Rng>(&self, rng: &mut R) -> Decision {
        let delay = if rng.gen_bool(self.slow_probability.clamp(0.0, 1.0)) {
            let (lo, hi) = (self.min_delay.as_micros() as u64, self.max_delay.as_micros() as u64);
            if hi > lo {
                Duration::from_micros(rng.gen_range(lo..=hi))
            } else {
                self.min_delay
            }
        } else {
            Duration::ZERO
        };
        let fail = rng.gen_bool(self.failure_probability.clamp(0.0, 1.0));
        Decision { delay, fail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn policy(failure_probability: f64) -> FaultPolicy {
        FaultPolicy {
            min_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(800),
            failure_probability,
            slow_probability: 1.0,
        }
    }

    #[test]
    fn test_delay_within_range() {
        let p = policy(0.2);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1_000 {
            let d = p.decide(&mut rng);
            assert!(d.delay >= p.min_delay && d.delay <= p.max_delay);
        }
    }

    #[test]
    fn test_failure_probability_extremes() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!((0..200).all(|_| policy(1.0).decide(&mut rng).fail));
        assert!((0..200).all(|_| !policy(0.0).decide(&mut rng).fail));
    }

    #[test]
    fn test_failure_rate_roughly_matches() {
        let p = policy(0.3);
        let mut rng = StdRng::seed_from_u64(2024);
        let failures = (0..10_000).filter(|_| p.decide(&mut rng).fail).count();
        assert!((2_700..3_300).contains(&failures), "got {}", failures);
    }

    #[test]
    fn test_same_seed_same_decisions() {
        let p = policy(0.5);
        let mut a = StdRng::seed_from_u64(9);
        let mut b = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            assert_eq!(p.decide(&mut a), p.decide(&mut b));
        }
    }

    #[test]
    fn test_slow_probability_zero_skips_delay() {
        let mut p = policy(0.0);
        p.slow_probability = 0.0;
        let mut rng = StdRng::seed_from_u64(3);
        assert!((0..100).all(|_| p.decide(&mut rng).delay.is_zero()));
    }
}
