//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::LabConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: `{value}`")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<LabConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: LabConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// File (or defaults), then process environment, then validation.
pub fn load(path: Option<&Path>) -> Result<LabConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => LabConfig::default(),
    };
    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply the lab's environment variables on top of `config`.
///
/// Durations given in seconds (`CB_RESET_TIMEOUT`, `RETRY_*`) accept fractions.
pub fn apply_env_overrides<F>(config: &mut LabConfig, env: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    fn parse<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
        value.trim().parse().map_err(|_| ConfigError::Env {
            var,
            value: value.to_string(),
        })
    }

    fn secs_to_ms(var: &'static str, value: &str) -> Result<u64, ConfigError> {
        let secs: f64 = parse(var, value)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(ConfigError::Env {
                var,
                value: value.to_string(),
            });
        }
        Ok((secs * 1000.0).round() as u64)
    }

    if let Some(v) = env("BACKEND_URL") {
        config.client.backend_url = v;
    }
    if let Some(v) = env("CB_FAIL_MAX") {
        config.breaker.failure_threshold = parse("CB_FAIL_MAX", &v)?;
    }
    if let Some(v) = env("CB_RESET_TIMEOUT") {
        config.breaker.reset_timeout_ms = secs_to_ms("CB_RESET_TIMEOUT", &v)?;
    }
    if let Some(v) = env("CB_HALF_OPEN_MAX_CALLS") {
        config.breaker.half_open_max_trials = parse("CB_HALF_OPEN_MAX_CALLS", &v)?;
    }
    if let Some(v) = env("CB_SUCCESS_THRESHOLD") {
        config.breaker.success_threshold = parse("CB_SUCCESS_THRESHOLD", &v)?;
    }
    if let Some(v) = env("RETRY_MAX_ATTEMPTS") {
        config.retry.max_attempts = parse("RETRY_MAX_ATTEMPTS", &v)?;
    }
    if let Some(v) = env("RETRY_BASE") {
        config.retry.base_delay_ms = secs_to_ms("RETRY_BASE", &v)?;
    }
    if let Some(v) = env("RETRY_MAX") {
        config.retry.cap_delay_ms = secs_to_ms("RETRY_MAX", &v)?;
    }
    if let Some(v) = env("RETRY_JITTER") {
        config.retry.jitter_span_ms = secs_to_ms("RETRY_JITTER", &v)?;
    }
    if let Some(v) = env("FAILURE_RATE") {
        config.simulator.failure_probability = parse("FAILURE_RATE", &v)?;
    }
    if let Some(v) = env("SLOW_RATE") {
        config.simulator.slow_probability = parse("SLOW_RATE", &v)?;
    }
    if let Some(v) = env("MIN_DELAY_MS") {
        config.simulator.min_delay_ms = parse("MIN_DELAY_MS", &v)?;
    }
    if let Some(v) = env("MAX_DELAY_MS") {
        config.simulator.max_delay_ms = parse("MAX_DELAY_MS", &v)?;
    }
    if let Some(v) = env("EVENT_LOG_PATH") {
        config.event_log.path = Some(v);
    }
    Ok(())
}
