//! Fault-tolerance lab: circuit breaker, retry with backoff, fault simulator.

pub mod chaos;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod simulator;

pub use config::schema::LabConfig;
pub use error::{CallError, ErrorKind};
pub use http::ClientServer;
pub use lifecycle::Shutdown;
pub use resilience::{CircuitBreaker, ResilienceClient};
pub use simulator::{FaultSimulator, SimulatorServer};
