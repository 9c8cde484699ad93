//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides)
//!     → validation.rs (semantic checks)
//!     → LabConfig (validated, immutable)
//!     → shared by reference with all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is static for the process lifetime; no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load, load_config, ConfigError};
pub use schema::{
    BreakerConfig, ClientConfig, EventLogConfig, LabConfig, LogFormat, ObservabilityConfig,
    RetryConfig, SimulatorConfig,
};
