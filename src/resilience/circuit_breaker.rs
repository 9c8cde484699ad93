//! Circuit breaker for the outbound dependency.
//!
//! # States
//! - Closed: normal operation, attempts pass through
//! - Open: dependency assumed down, attempts are short-circuited
//! - Half-Open: a bounded number of probe attempts test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: first allow() at or after opened_at + reset_timeout
//! Half-Open → Closed: success_threshold consecutive probe successes
//! Half-Open → Open: any probe failure (opened_at restarts)
//! ```
//!
//! # Design Decisions
//! - `BreakerCore` is a pure decision function over (state, outcome, now)
//! - The Open → Half-Open check happens lazily inside `allow()`; there is no timer task
//! - `CircuitBreaker` guards the core with a mutex so allow/record pairs are atomic
//! - Every grant is a `Ticket` stamped with the generation it was issued in;
//!   the generation advances on each transition, so an attempt admitted
//!   before a transition can never settle a half-open probe
//! - Transitions are appended to the event log inside the critical section,
//!   so log order matches the order in which transitions happened
//! - Connection failures and remote errors are indistinguishable here

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::BreakerConfig;
use crate::error::ProtocolViolation;
use crate::observability::event_log::{EventLog, ParseEventError};
use crate::resilience::clock::{Clock, SystemClock};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        }
    }

    /// Gauge encoding: 0 closed, 1 half-open, 2 open.
    pub fn as_gauge(&self) -> f64 {
        match self {
            BreakerState::Closed => 0.0,
            BreakerState::HalfOpen => 1.0,
            BreakerState::Open => 2.0,
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BreakerState {
    type Err = ParseEventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CLOSED" => Ok(BreakerState::Closed),
            "OPEN" => Ok(BreakerState::Open),
            "HALF_OPEN" => Ok(BreakerState::HalfOpen),
            other => Err(ParseEventError::UnknownState(other.to_string())),
        }
    }
}

/// A state change produced by the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: BreakerState,
    pub to: BreakerState,
}

/// Process-wide ticket ids, so a ticket presented to the wrong breaker never matches.
static NEXT_TICKET: AtomicU64 = AtomicU64::new(1);

/// Permission for exactly one attempt.
///
/// Returned by `allow`; consumed by `record_outcome` or `release`.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a granted attempt must be recorded or released"]
pub struct Ticket {
    id: u64,
    generation: u64,
}

/// Result of asking the core for permission to attempt.
#[derive(Debug, PartialEq, Eq)]
pub struct Admission {
    pub ticket: Option<Ticket>,
    pub transition: Option<Transition>,
}

/// Point-in-time view of the breaker, for health endpoints and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub generation: u64,
    pub consecutive_failures: u32,
    pub half_open_trials_used: u32,
    pub half_open_successes: u32,
    pub in_flight: u32,
    /// Milliseconds since the breaker last opened, while Open.
    pub open_for_ms: Option<u64>,
}

/// Lock-free breaker state machine. Time is passed in, never read.
#[derive(Debug, Clone)]
pub struct BreakerCore {
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_max_trials: u32,
    success_threshold: u32,

    state: BreakerState,
    /// Bumped on every transition.
    generation: u64,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// Probes of the current half-open generation still outstanding.
    half_open_trials_used: u32,
    half_open_successes: u32,
    /// Tickets handed out by `allow` that have not been recorded or released.
    outstanding: HashSet<u64>,
}

impl BreakerCore {
    pub fn new(config: &BreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            reset_timeout: config.reset_timeout(),
            half_open_max_trials: config.half_open_max_trials.max(1),
            success_threshold: config.success_threshold.max(1),
            state: BreakerState::Closed,
            generation: 0,
            consecutive_failures: 0,
            opened_at: None,
            half_open_trials_used: 0,
            half_open_successes: 0,
            outstanding: HashSet::new(),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn allow(&mut self, now: Instant) -> Admission {
        match self.state {
            BreakerState::Closed => Admission {
                ticket: Some(self.issue()),
                transition: None,
            },
            BreakerState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|opened| now.saturating_duration_since(opened));
                if elapsed.is_some_and(|e| e < self.reset_timeout) {
                    return Admission { ticket: None, transition: None };
                }
                let transition = self.transition_to(BreakerState::HalfOpen);
                // This call is itself the first probe.
                self.half_open_trials_used = 1;
                Admission {
                    ticket: Some(self.issue()),
                    transition: Some(transition),
                }
            }
            BreakerState::HalfOpen => {
                if self.half_open_trials_used < self.half_open_max_trials {
                    self.half_open_trials_used += 1;
                    Admission { ticket: Some(self.issue()), transition: None }
                } else {
                    Admission { ticket: None, transition: None }
                }
            }
        }
    }

    pub fn record(
        &mut self,
        ticket: Ticket,
        success: bool,
        now: Instant,
    ) -> Result<Option<Transition>, ProtocolViolation> {
        self.redeem(&ticket)?;
        let probe = ticket.generation == self.generation;

        let transition = match (self.state, success) {
            (BreakerState::Closed, true) => {
                self.consecutive_failures = 0;
                None
            }
            (BreakerState::Closed, false) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.failure_threshold {
                    let t = self.transition_to(BreakerState::Open);
                    self.opened_at = Some(now);
                    Some(t)
                } else {
                    None
                }
            }
            // Outcome of an attempt granted before the breaker opened.
            // Does not move opened_at.
            (BreakerState::Open, _) => None,
            // Admitted before this half-open round; not a probe.
            (BreakerState::HalfOpen, _) if !probe => None,
            (BreakerState::HalfOpen, false) => {
                let t = self.transition_to(BreakerState::Open);
                self.opened_at = Some(now);
                Some(t)
            }
            (BreakerState::HalfOpen, true) => {
                self.half_open_successes += 1;
                self.half_open_trials_used = self.half_open_trials_used.saturating_sub(1);
                if self.half_open_successes >= self.success_threshold {
                    let t = self.transition_to(BreakerState::Closed);
                    self.consecutive_failures = 0;
                    Some(t)
                } else {
                    None
                }
            }
        };
        Ok(transition)
    }

    /// Return a ticket whose attempt was abandoned before it produced an outcome.
    pub fn release(&mut self, ticket: Ticket) -> Result<(), ProtocolViolation> {
        self.redeem(&ticket)?;
        if self.state == BreakerState::HalfOpen && ticket.generation == self.generation {
            self.half_open_trials_used = self.half_open_trials_used.saturating_sub(1);
        }
        Ok(())
    }

    pub fn snapshot(&self, now: Instant) -> BreakerSnapshot {
        BreakerSnapshot {
            state: self.state,
            generation: self.generation,
            consecutive_failures: self.consecutive_failures,
            half_open_trials_used: self.half_open_trials_used,
            half_open_successes: self.half_open_successes,
            in_flight: self.outstanding.len() as u32,
            open_for_ms: match self.state {
                BreakerState::Open => self
                    .opened_at
                    .map(|opened| now.saturating_duration_since(opened).as_millis() as u64),
                _ => None,
            },
        }
    }

    fn issue(&mut self) -> Ticket {
        let id = NEXT_TICKET.fetch_add(1, Ordering::Relaxed);
        self.outstanding.insert(id);
        Ticket {
            id,
            generation: self.generation,
        }
    }

    fn redeem(&mut self, ticket: &Ticket) -> Result<(), ProtocolViolation> {
        if self.outstanding.remove(&ticket.id) {
            Ok(())
        } else {
            Err(ProtocolViolation { state: self.state })
        }
    }

    fn transition_to(&mut self, to: BreakerState) -> Transition {
        let from = self.state;
        self.state = to;
        self.generation += 1;
        self.half_open_trials_used = 0;
        self.half_open_successes = 0;
        if to != BreakerState::Open {
            self.opened_at = None;
        }
        Transition { from, to }
    }
}

/// Shared breaker handle for one dependency.
///
/// Callers hold an `Arc<CircuitBreaker>`; every `allow`/`record_outcome`
/// runs under the same lock.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    core: Mutex<BreakerCore>,
    clock: Arc<dyn Clock>,
    log: EventLog,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("core", &*self.lock())
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig, log: EventLog) -> Self {
        Self::with_clock(name, config, log, Arc::new(SystemClock))
    }

    pub fn with_clock(
        name: impl Into<String>,
        config: BreakerConfig,
        log: EventLog,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let core = BreakerCore::new(&config);
        Self {
            name: name.into(),
            config,
            core: Mutex::new(core),
            clock,
            log,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Ask whether an attempt may reach the dependency. `Some` is a grant
    /// that must be settled with `record_outcome` or `release`.
    pub fn allow(&self) -> Option<Ticket> {
        let now = self.clock.now();
        let mut core = self.lock();
        let admission = core.allow(now);
        if let Some(t) = admission.transition {
            self.emit(t);
        }
        if admission.ticket.is_none() {
            tracing::debug!(breaker = %self.name, state = %core.state(), "Attempt short-circuited");
        }
        admission.ticket
    }

    pub fn record_outcome(&self, ticket: Ticket, success: bool) -> Result<(), ProtocolViolation> {
        let now = self.clock.now();
        let mut core = self.lock();
        match core.record(ticket, success, now) {
            Ok(Some(t)) => {
                self.emit(t);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(violation) => {
                tracing::error!(breaker = %self.name, error = %violation, "Breaker protocol violated");
                Err(violation)
            }
        }
    }

    pub fn release(&self, ticket: Ticket) -> Result<(), ProtocolViolation> {
        self.lock().release(ticket)
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state()
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let now = self.clock.now();
        self.lock().snapshot(now)
    }

    fn emit(&self, t: Transition) {
        tracing::debug!(breaker = %self.name, from = %t.from, to = %t.to, "Breaker transition");
        self.log.record_transition(t.from, t.to);
    }

    fn lock(&self) -> MutexGuard<'_, BreakerCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
