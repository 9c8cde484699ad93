//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Application call:
//!     → client.rs (entry point, one call = 1..N attempts)
//!     → circuit_breaker.rs (gate each attempt, track outcomes)
//!     → retries.rs + backoff.rs (retry transient failures with jittered backoff)
//!     → timeouts.rs (enforce per-attempt deadline)
//!     → transport.rs (one exchange with the dependency)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every attempt has a deadline
//! - One breaker per dependency, shared through `Arc`
//! - Failures are values (`CallError`), classified once and never re-invented

pub mod backoff;
pub mod circuit_breaker;
pub mod client;
pub mod clock;
pub mod retries;
pub mod timeouts;
pub mod transport;

pub use circuit_breaker::{BreakerSnapshot, BreakerState, CircuitBreaker};
pub use client::ResilienceClient;
pub use retries::RetryPolicy;
pub use transport::{HttpTransport, Request, Response, Transport};
