//! Resilience client: the single entry point applications call.
//!
//! # Data Flow
//! ```text
//! call(request)
//!     → breaker.allow()          (no ticket: log SHORT_CIRCUITED, fail fast)
//!     → retries.rs loop
//!         → breaker.allow()      (attempts after the first)
//!         → timeouts.rs          (per-attempt deadline)
//!         → transport.send()
//!         → event log + breaker.record_outcome(ticket)
//! ```
//!
//! # Design Decisions
//! - Outcomes reach the breaker per attempt, not batched at the end of a call
//! - A breaker grant is released if the call is dropped mid-attempt
//! - The application only sees the final classification

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::LabConfig;
use crate::error::{CallError, ProtocolViolation};
use crate::observability::event_log::{AttemptOutcome, EventLog};
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{CircuitBreaker, Ticket};
use crate::resilience::retries::{AttemptContext, RetryPolicy};
use crate::resilience::timeouts::with_deadline;
use crate::resilience::transport::{Request, Response, Transport};

/// An `allow()` ticket that must be settled exactly once.
struct Grant<'a> {
    breaker: &'a CircuitBreaker,
    ticket: Option<Ticket>,
}

impl<'a> Grant<'a> {
    fn new(breaker: &'a CircuitBreaker, ticket: Ticket) -> Self {
        Self {
            breaker,
            ticket: Some(ticket),
        }
    }

    fn settle(mut self, result: &Result<Response, CallError>) -> Result<(), ProtocolViolation> {
        let failed = result.as_ref().err().is_some_and(CallError::counts_as_breaker_failure);
        match self.ticket.take() {
            Some(ticket) => self.breaker.record_outcome(ticket, !failed),
            None => Ok(()),
        }
    }
}

impl Drop for Grant<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            tracing::debug!(breaker = %self.breaker.name(), "Attempt abandoned, releasing breaker grant");
            if let Err(e) = self.breaker.release(ticket) {
                tracing::error!(error = %e, "Failed to release breaker grant");
            }
        }
    }
}

/// Retry policy wrapped around a circuit breaker wrapped around a transport.
#[derive(Debug)]
pub struct ResilienceClient<T> {
    transport: T,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
    log: EventLog,
}

impl<T: Transport> ResilienceClient<T> {
    pub fn new(
        transport: T,
        breaker: Arc<CircuitBreaker>,
        retry: RetryPolicy,
        attempt_timeout: Duration,
        log: EventLog,
    ) -> Self {
        Self {
            transport,
            breaker,
            retry,
            attempt_timeout,
            log,
        }
    }

    /// Build a client and its breaker from the lab configuration.
    pub fn from_config(config: &LabConfig, transport: T, log: EventLog) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(
            "backend-breaker",
            config.breaker.clone(),
            log.clone(),
        ));
        Self::new(
            transport,
            breaker,
            RetryPolicy::from_config(&config.retry),
            config.client.attempt_timeout(),
            log,
        )
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub async fn call(&self, request: &Request) -> Result<Response, CallError> {
        let call_id = Uuid::new_v4();
        let span = tracing::info_span!("call", %call_id);

        async move {
            let Some(ticket) = self.breaker.allow() else {
                self.log
                    .record_attempt(1, AttemptOutcome::ShortCircuited, Duration::ZERO, Duration::ZERO);
                metrics::record_call(Err(&CallError::CircuitOpen));
                return Err(CallError::CircuitOpen);
            };

            let mut first = Some(Grant::new(&self.breaker, ticket));
            let result = self
                .retry
                .execute(|ctx| {
                    let grant = first.take();
                    self.attempt(ctx, request, grant)
                })
                .await;

            metrics::record_call(result.as_ref().map(|_| ()));
            match &result {
                Ok(_) => tracing::debug!(breaker = %self.breaker.state(), "Call succeeded"),
                Err(e) => tracing::debug!(breaker = %self.breaker.state(), kind = %e.kind(), "Call failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn attempt(
        &self,
        ctx: AttemptContext,
        request: &Request,
        grant: Option<Grant<'_>>,
    ) -> Result<Response, CallError> {
        let grant = match grant {
            Some(grant) => grant,
            None => match self.breaker.allow() {
                Some(ticket) => Grant::new(&self.breaker, ticket),
                None => {
                    self.log.record_attempt(
                        ctx.number,
                        AttemptOutcome::ShortCircuited,
                        ctx.delay_before,
                        Duration::ZERO,
                    );
                    return Err(CallError::CircuitOpen);
                }
            },
        };

        let started = Instant::now();
        let result = with_deadline(self.attempt_timeout, self.transport.send(request)).await;
        let latency = started.elapsed();

        let outcome = match &result {
            Ok(_) => AttemptOutcome::Success,
            Err(CallError::Timeout { .. }) => AttemptOutcome::Timeout,
            Err(_) => AttemptOutcome::Failure,
        };
        self.log.record_attempt(ctx.number, outcome, ctx.delay_before, latency);
        grant.settle(&result)?;
        result
    }
}
