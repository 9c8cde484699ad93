//! Offline summary of event log files.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::time::Duration;

use serde::Serialize;

use crate::observability::event_log::{AttemptOutcome, EventEntry};
use crate::resilience::circuit_breaker::BreakerState;

/// One transition on the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelinePoint {
    pub timestamp_ms: u64,
    pub from: BreakerState,
    pub to: BreakerState,
}

/// Aggregate view of an event log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventSummary {
    pub attempts: u64,
    pub by_outcome: BTreeMap<&'static str, u64>,
    /// Attempts with number > 1.
    pub retries: u64,
    /// Successful attempts over attempts that reached the dependency.
    pub success_rate: Option<f64>,
    pub max_backoff_ms: u64,
    pub transitions: Vec<TimelinePoint>,
    pub skipped_lines: u64,
}

impl EventSummary {
    pub fn from_entries<I: IntoIterator<Item = EventEntry>>(entries: I) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            summary.add(entry);
        }
        summary.finish()
    }

    /// Summarize a log file; unparsable lines are counted, not fatal.
    pub fn from_reader<R: BufRead>(reader: R) -> std::io::Result<Self> {
        let mut summary = Self::default();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<EventEntry>() {
                Ok(entry) => summary.add(entry),
                Err(e) => {
                    tracing::debug!(error = %e, line = %line, "Skipping event log line");
                    summary.skipped_lines += 1;
                }
            }
        }
        Ok(summary.finish())
    }

    fn add(&mut self, entry: EventEntry) {
        match entry {
            EventEntry::Attempt { attempt, outcome, delay, .. } => {
                self.attempts += 1;
                *self.by_outcome.entry(outcome.as_str()).or_default() += 1;
                if attempt > 1 {
                    self.retries += 1;
                }
                self.max_backoff_ms = self.max_backoff_ms.max(delay.as_millis() as u64);
            }
            EventEntry::Transition { timestamp_ms, from, to } => {
                self.transitions.push(TimelinePoint { timestamp_ms, from, to });
            }
        }
    }

    fn finish(mut self) -> Self {
        let count = |o: AttemptOutcome| self.by_outcome.get(o.as_str()).copied().unwrap_or(0);
        let reached = self.attempts - count(AttemptOutcome::ShortCircuited);
        self.success_rate = (reached > 0).then(|| count(AttemptOutcome::Success) as f64 / reached as f64);
        self
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}
