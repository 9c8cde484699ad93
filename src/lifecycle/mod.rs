//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger()
//!
//! Shutdown (shutdown.rs):
//!     broadcast → HTTP servers stop accepting, worker loop exits
//!
//! Worker (worker.rs):
//!     interval → ResilienceClient::call → log result
//! ```
//!
//! # Design Decisions
//! - One broadcast channel reaches every long-running task
//! - Stopping the worker drops its in-flight call; no further retries are issued

pub mod shutdown;
pub mod signals;
pub mod worker;

pub use shutdown::Shutdown;
