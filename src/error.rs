//! Error taxonomy for calls made through the resilience layer.
//!
//! # Classification
//! ```text
//! REMOTE_ERROR      dependency reachable, answered with a failure   → retried, breaker failure
//! TIMEOUT           no answer within the attempt deadline           → retried, breaker failure
//! CONNECTION_ERROR  dependency unreachable (includes chaos outages) → retried, breaker failure
//! CIRCUIT_OPEN      short-circuited, no attempt made                → never retried
//! PROTOCOL_VIOLATION internal misuse of the breaker                 → never retried, escalated
//! ```

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::resilience::circuit_breaker::BreakerState;

/// Stable classification of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    RemoteError,
    Timeout,
    ConnectionError,
    CircuitOpen,
    ProtocolViolation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RemoteError => "REMOTE_ERROR",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::ConnectionError => "CONNECTION_ERROR",
            ErrorKind::CircuitOpen => "CIRCUIT_OPEN",
            ErrorKind::ProtocolViolation => "PROTOCOL_VIOLATION",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The breaker was asked to record an outcome it never granted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("protocol violation: outcome recorded in {state} state with no outstanding grant")]
pub struct ProtocolViolation {
    pub state: BreakerState,
}

/// Final (or per-attempt) failure of a call through the resilience layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// Dependency answered, but with a failure status.
    #[error("remote error: dependency returned status {status}")]
    Remote { status: u16 },

    /// No answer within the per-attempt deadline.
    #[error("timeout: no response within {after:?}")]
    Timeout { after: Duration },

    /// Dependency could not be reached at all.
    #[error("connection error: {reason}")]
    Connection { reason: String },

    /// Breaker is open; no attempt was made.
    #[error("circuit breaker open: call short-circuited")]
    CircuitOpen,

    #[error(transparent)]
    ProtocolViolation(#[from] ProtocolViolation),
}

impl CallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::Remote { .. } => ErrorKind::RemoteError,
            CallError::Timeout { .. } => ErrorKind::Timeout,
            CallError::Connection { .. } => ErrorKind::ConnectionError,
            CallError::CircuitOpen => ErrorKind::CircuitOpen,
            CallError::ProtocolViolation(_) => ErrorKind::ProtocolViolation,
        }
    }

    /// Transient failures are retried; short-circuits and internal bugs are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CallError::Remote { .. } | CallError::Timeout { .. } | CallError::Connection { .. }
        )
    }

    /// Whether this failure came from a real attempt against the dependency.
    pub fn counts_as_breaker_failure(&self) -> bool {
        self.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(CallError::Remote { status: 500 }.is_retryable());
        assert!(CallError::Timeout { after: Duration::from_secs(2) }.is_retryable());
        assert!(CallError::Connection { reason: "refused".into() }.is_retryable());
        assert!(!CallError::CircuitOpen.is_retryable());
        assert!(!CallError::from(ProtocolViolation { state: BreakerState::Open }).is_retryable());
    }

    #[test]
    fn test_only_dependency_failures_count_against_breaker() {
        assert!(CallError::Timeout { after: Duration::from_millis(1) }.counts_as_breaker_failure());
        assert!(CallError::Remote { status: 502 }.counts_as_breaker_failure());
        assert!(!CallError::CircuitOpen.counts_as_breaker_failure());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(CallError::Remote { status: 503 }.kind().as_str(), "REMOTE_ERROR");
        assert_eq!(CallError::CircuitOpen.kind().to_string(), "CIRCUIT_OPEN");
    }
}
