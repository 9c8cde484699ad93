//! Client service HTTP surface.
//!
//! # Data Flow
//! ```text
//! GET /        → liveness message
//! GET /health  → handlers.rs (breaker snapshot + effective config)
//! GET /call    → handlers.rs (one ResilienceClient::call, status mapped from CallError)
//! ```

pub mod handlers;
pub mod server;

pub use server::{AppState, ClientServer};
