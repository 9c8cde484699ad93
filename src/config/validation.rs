//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds >= 1, probabilities in [0,1])
//! - Validate the dependency URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LabConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use url::Url;

use crate::config::schema::LabConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &LabConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut check = |ok: bool, field: &'static str, message: String| {
        if !ok {
            errors.push(ValidationError { field, message });
        }
    };

    let b = &config.breaker;
    check(b.failure_threshold >= 1, "breaker.failure_threshold", "must be at least 1".into());
    check(b.half_open_max_trials >= 1, "breaker.half_open_max_trials", "must be at least 1".into());
    check(b.success_threshold >= 1, "breaker.success_threshold", "must be at least 1".into());

    let r = &config.retry;
    check(r.max_attempts >= 1, "retry.max_attempts", "must be at least 1".into());
    check(
        r.base_delay_ms <= r.cap_delay_ms,
        "retry.base_delay_ms",
        format!("{} exceeds cap_delay_ms {}", r.base_delay_ms, r.cap_delay_ms),
    );

    let c = &config.client;
    check(c.attempt_timeout_ms > 0, "client.attempt_timeout_ms", "must be greater than 0".into());
    match Url::parse(&c.backend_url) {
        Ok(url) => check(
            matches!(url.scheme(), "http" | "https"),
            "client.backend_url",
            format!("unsupported scheme `{}`", url.scheme()),
        ),
        Err(e) => check(false, "client.backend_url", e.to_string()),
    }

    let s = &config.simulator;
    check(
        s.min_delay_ms <= s.max_delay_ms,
        "simulator.min_delay_ms",
        format!("{} exceeds max_delay_ms {}", s.min_delay_ms, s.max_delay_ms),
    );
    check(
        (0.0..=1.0).contains(&s.failure_probability),
        "simulator.failure_probability",
        format!("{} is outside [0, 1]", s.failure_probability),
    );
    check(
        (0.0..=1.0).contains(&s.slow_probability),
        "simulator.slow_probability",
        format!("{} is outside [0, 1]", s.slow_probability),
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
