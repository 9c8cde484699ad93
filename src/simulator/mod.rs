//! Fault simulator: the unreliable dependency under test.
//!
//! # Data Flow
//! ```text
//! request
//!     → policy.rs (draw delay ~ U(min,max), fail ~ Bernoulli(p))
//!     → sleep(delay)
//!     → 200 {"ok":true,"ts":...} | 500 "backend error"
//! ```
//!
//! # Design Decisions
//! - No per-request state; only the random source is shared
//! - Served over HTTP by server.rs, or used in-process as a `Transport`

pub mod policy;
pub mod server;

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::CallError;
use crate::resilience::transport::{Request, Response, Transport};

pub use policy::{Decision, FaultPolicy};
pub use server::SimulatorServer;

/// Status the simulator answers with when it decides to fail.
pub const FAILURE_STATUS: u16 = 500;

/// Randomized backend.
#[derive(Debug)]
pub struct FaultSimulator {
    policy: FaultPolicy,
    rng: Mutex<StdRng>,
}

impl FaultSimulator {
    pub fn new(policy: FaultPolicy) -> Self {
        Self {
            policy,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic simulator for reproducible experiments.
    pub fn with_seed(policy: FaultPolicy, seed: u64) -> Self {
        Self {
            policy,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn policy(&self) -> &FaultPolicy {
        &self.policy
    }

    fn decide(&self) -> Decision {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        self.policy.decide(&mut *rng)
    }

    /// Serve one request: wait the drawn delay, then succeed or fail.
    /// The request content does not influence the decision.
    pub fn handle(&self, _request: &Request) -> impl Future<Output = Result<Response, CallError>> + Send + 'static {
        let decision = self.decide();
        async move {
            if !decision.delay.is_zero() {
                tokio::time::sleep(decision.delay).await;
            }
            if decision.fail {
                tracing::debug!(delay_ms = decision.delay.as_millis() as u64, "Simulated failure");
                return Err(CallError::Remote { status: FAILURE_STATUS });
            }
            let ts = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            Ok(Response::ok(serde_json::json!({ "ok": true, "ts": ts }).to_string()))
        }
    }
}

impl Transport for FaultSimulator {
    fn send(&self, request: &Request) -> impl Future<Output = Result<Response, CallError>> + Send {
        self.handle(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_failure_still_costs_latency() {
        let sim = FaultSimulator::with_seed(
            FaultPolicy {
                min_delay: Duration::from_millis(300),
                max_delay: Duration::from_millis(300),
                failure_probability: 1.0,
                slow_probability: 1.0,
            },
            5,
        );
        let start = tokio::time::Instant::now();
        let result = sim.handle(&Request::get("/work")).await;
        assert_eq!(result, Err(CallError::Remote { status: 500 }));
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_healthy_policy_answers_ok_json() {
        let sim = FaultSimulator::new(FaultPolicy::healthy());
        let response = sim.send(&Request::default()).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.json().unwrap()["ok"], true);
    }
}
