//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the lab.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct LabConfig {
    /// Circuit breaker thresholds.
    pub breaker: BreakerConfig,

    /// Retry and backoff settings.
    pub retry: RetryConfig,

    /// Client service settings (dependency URL, deadlines, worker loop).
    pub client: ClientConfig,

    /// Fault simulator settings.
    pub simulator: SimulatorConfig,

    /// Where event log lines go.
    pub event_log: EventLogConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker.
    pub failure_threshold: u32,

    /// How long the breaker stays open before probing, in milliseconds.
    pub reset_timeout_ms: u64,

    /// Outstanding probe attempts allowed while half-open.
    pub half_open_max_trials: u32,

    /// Consecutive probe successes needed to close again.
    pub success_threshold: u32,
}

impl BreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout_ms: 5_000,
            half_open_max_trials: 1,
            success_threshold: 1,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum backoff delay in milliseconds (before jitter).
    pub cap_delay_ms: u64,

    /// Upper bound of the uniform jitter added to each delay, in milliseconds.
    pub jitter_span_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            cap_delay_ms: 2_000,
            jitter_span_ms: 100,
        }
    }
}

/// Client service configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Dependency endpoint.
    pub backend_url: String,

    /// Deadline for a single attempt in milliseconds.
    pub attempt_timeout_ms: u64,

    /// Bind address of the client's own HTTP surface.
    pub bind_address: String,

    /// Run the background worker loop.
    pub worker_enabled: bool,

    /// Pause between worker calls in milliseconds.
    pub worker_interval_ms: u64,
}

impl ClientConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn worker_interval(&self) -> Duration {
        Duration::from_millis(self.worker_interval_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000/work".to_string(),
            attempt_timeout_ms: 2_000,
            bind_address: "0.0.0.0:8001".to_string(),
            worker_enabled: true,
            worker_interval_ms: 300,
        }
    }
}

/// Fault simulator configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Bind address of the simulator HTTP server.
    pub bind_address: String,

    /// Lower bound of the injected latency in milliseconds.
    pub min_delay_ms: u64,

    /// Upper bound of the injected latency in milliseconds.
    pub max_delay_ms: u64,

    /// Probability of answering 500, in [0, 1].
    pub failure_probability: f64,

    /// Probability that latency is injected at all, in [0, 1].
    pub slow_probability: f64,

    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            min_delay_ms: 0,
            max_delay_ms: 800,
            failure_probability: 0.2,
            slow_probability: 1.0,
            seed: None,
        }
    }
}

/// Event log sink.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct EventLogConfig {
    /// Append lines to this file. Takes precedence over `stdout`.
    pub path: Option<String>,

    /// Write lines to stdout when no path is set.
    pub stdout: bool,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Pretty for development, JSON for log shipping.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: LabConfig = toml::from_str(
            r#"
            [breaker]
            failure_threshold = 2
            reset_timeout_ms = 1000

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.breaker.failure_threshold, 2);
        assert_eq!(config.breaker.reset_timeout(), Duration::from_secs(1));
        assert_eq!(config.breaker.half_open_max_trials, 1);
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
