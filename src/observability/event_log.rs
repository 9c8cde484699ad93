//! Append-only structured event log.
//!
//! # Line Format
//! ```text
//! <unix_ms>,ATTEMPT,<attempt>,<outcome>,<delay_ms>,<latency_ms>
//! <unix_ms>,TRANSITION,<from>,<to>
//! ```
//!
//! # Design Decisions
//! - One lock acquisition per entry, so concurrent writers never interleave fields
//! - Write failures are reported through tracing and never fail the call path
//! - Every entry is mirrored as a tracing event and a metric

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::config::EventLogConfig;
use crate::observability::metrics;
use crate::resilience::circuit_breaker::BreakerState;

/// Outcome of a single attempt as it appears in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptOutcome {
    Success,
    Failure,
    Timeout,
    ShortCircuited,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "SUCCESS",
            AttemptOutcome::Failure => "FAILURE",
            AttemptOutcome::Timeout => "TIMEOUT",
            AttemptOutcome::ShortCircuited => "SHORT_CIRCUITED",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptOutcome {
    type Err = ParseEventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(AttemptOutcome::Success),
            "FAILURE" => Ok(AttemptOutcome::Failure),
            "TIMEOUT" => Ok(AttemptOutcome::Timeout),
            "SHORT_CIRCUITED" => Ok(AttemptOutcome::ShortCircuited),
            other => Err(ParseEventError::UnknownOutcome(other.to_string())),
        }
    }
}

/// A single line of the event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventEntry {
    Attempt {
        timestamp_ms: u64,
        attempt: u32,
        outcome: AttemptOutcome,
        delay: Duration,
        latency: Duration,
    },
    Transition {
        timestamp_ms: u64,
        from: BreakerState,
        to: BreakerState,
    },
}

impl fmt::Display for EventEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventEntry::Attempt { timestamp_ms, attempt, outcome, delay, latency } => write!(
                f,
                "{},ATTEMPT,{},{},{},{}",
                timestamp_ms,
                attempt,
                outcome,
                delay.as_millis(),
                latency.as_millis()
            ),
            EventEntry::Transition { timestamp_ms, from, to } => {
                write!(f, "{},TRANSITION,{},{}", timestamp_ms, from, to)
            }
        }
    }
}

/// Error returned when a log line cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseEventError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("unknown event kind `{0}`")]
    UnknownKind(String),
    #[error("unknown attempt outcome `{0}`")]
    UnknownOutcome(String),
    #[error("unknown breaker state `{0}`")]
    UnknownState(String),
    #[error("invalid number in field `{field}`: `{value}`")]
    InvalidNumber { field: &'static str, value: String },
}

fn parse_num<N: FromStr>(field: &'static str, value: &str) -> Result<N, ParseEventError> {
    value.trim().parse().map_err(|_| ParseEventError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

impl FromStr for EventEntry {
    type Err = ParseEventError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.trim().split(',').collect();
        if fields.len() < 2 {
            return Err(ParseEventError::FieldCount { expected: 4, found: fields.len() });
        }
        let timestamp_ms = parse_num("timestamp", fields[0])?;

        match fields[1] {
            "ATTEMPT" => {
                // delay and latency columns are optional for the short form
                if fields.len() != 4 && fields.len() != 6 {
                    return Err(ParseEventError::FieldCount { expected: 6, found: fields.len() });
                }
                let attempt = parse_num("attempt", fields[2])?;
                let outcome = fields[3].parse()?;
                let (delay, latency) = if fields.len() == 6 {
                    (
                        Duration::from_millis(parse_num("delay_ms", fields[4])?),
                        Duration::from_millis(parse_num("latency_ms", fields[5])?),
                    )
                } else {
                    (Duration::ZERO, Duration::ZERO)
                };
                Ok(EventEntry::Attempt { timestamp_ms, attempt, outcome, delay, latency })
            }
            "TRANSITION" => {
                if fields.len() != 4 {
                    return Err(ParseEventError::FieldCount { expected: 4, found: fields.len() });
                }
                Ok(EventEntry::Transition {
                    timestamp_ms,
                    from: fields[2].parse()?,
                    to: fields[3].parse()?,
                })
            }
            other => Err(ParseEventError::UnknownKind(other.to_string())),
        }
    }
}

enum Sink {
    Memory(Vec<EventEntry>),
    Writer(Box<dyn Write + Send>),
    Discard,
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sink::Memory(entries) => f.debug_tuple("Memory").field(&entries.len()).finish(),
            Sink::Writer(_) => f.write_str("Writer"),
            Sink::Discard => f.write_str("Discard"),
        }
    }
}

/// Shared handle to the event log. Clones append to the same sink.
#[derive(Debug, Clone)]
pub struct EventLog {
    sink: Arc<Mutex<Sink>>,
}

impl EventLog {
    fn with_sink(sink: Sink) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    /// Keep entries in memory; retrieve them with [`EventLog::entries`].
    pub fn in_memory() -> Self {
        Self::with_sink(Sink::Memory(Vec::new()))
    }

    pub fn stdout() -> Self {
        Self::with_sink(Sink::Writer(Box::new(io::stdout())))
    }

    /// Entries still reach tracing and metrics, but no lines are written.
    pub fn discard() -> Self {
        Self::with_sink(Sink::Discard)
    }

    /// Open `path` in append mode, creating it if needed.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::with_sink(Sink::Writer(Box::new(file))))
    }

    pub fn from_config(config: &EventLogConfig) -> io::Result<Self> {
        match &config.path {
            Some(path) => Self::open(Path::new(path)),
            None if config.stdout => Ok(Self::stdout()),
            None => Ok(Self::discard()),
        }
    }

    pub fn record_attempt(
        &self,
        attempt: u32,
        outcome: AttemptOutcome,
        delay: Duration,
        latency: Duration,
    ) {
        self.append(EventEntry::Attempt {
            timestamp_ms: unix_millis(),
            attempt,
            outcome,
            delay,
            latency,
        });
    }

    pub fn record_transition(&self, from: BreakerState, to: BreakerState) {
        self.append(EventEntry::Transition {
            timestamp_ms: unix_millis(),
            from,
            to,
        });
    }

    /// Append one entry atomically.
    pub fn append(&self, entry: EventEntry) {
        mirror(&entry);

        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *sink {
            Sink::Memory(entries) => entries.push(entry),
            Sink::Writer(writer) => {
                let line = format!("{}\n", entry);
                if let Err(e) = writer.write_all(line.as_bytes()).and_then(|_| writer.flush()) {
                    tracing::error!(error = %e, "Failed to write event log entry");
                }
            }
            Sink::Discard => {}
        }
    }

    /// Snapshot of the entries held by an in-memory log. Empty for other sinks.
    pub fn entries(&self) -> Vec<EventEntry> {
        match &*self.sink.lock().unwrap_or_else(PoisonError::into_inner) {
            Sink::Memory(entries) => entries.clone(),
            _ => Vec::new(),
        }
    }

    pub fn attempts(&self) -> Vec<EventEntry> {
        self.entries()
            .into_iter()
            .filter(|e| matches!(e, EventEntry::Attempt { .. }))
            .collect()
    }

    pub fn transitions(&self) -> Vec<(BreakerState, BreakerState)> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                EventEntry::Transition { from, to, .. } => Some((from, to)),
                _ => None,
            })
            .collect()
    }
}

fn mirror(entry: &EventEntry) {
    match entry {
        EventEntry::Attempt { attempt, outcome, delay, latency, .. } => {
            metrics::record_attempt(*outcome, *latency);
            if *outcome == AttemptOutcome::Success {
                tracing::info!(
                    target: "event_log",
                    attempt,
                    outcome = %outcome,
                    delay_ms = delay.as_millis() as u64,
                    latency_ms = latency.as_millis() as u64,
                    "Attempt completed"
                );
            } else {
                tracing::warn!(
                    target: "event_log",
                    attempt,
                    outcome = %outcome,
                    delay_ms = delay.as_millis() as u64,
                    latency_ms = latency.as_millis() as u64,
                    "Attempt failed"
                );
            }
        }
        EventEntry::Transition { from, to, .. } => {
            metrics::record_transition(*from, *to);
            tracing::warn!(target: "event_log", from = %from, to = %to, "[CB Transition] {} -> {}", from, to);
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_line_format() {
        let entry = EventEntry::Attempt {
            timestamp_ms: 1700000000123,
            attempt: 2,
            outcome: AttemptOutcome::Timeout,
            delay: Duration::from_millis(215),
            latency: Duration::from_millis(2000),
        };
        assert_eq!(entry.to_string(), "1700000000123,ATTEMPT,2,TIMEOUT,215,2000");
    }

    #[test]
    fn test_transition_line_parses() {
        let entry: EventEntry = "1700000000999,TRANSITION,HALF_OPEN,OPEN".parse().unwrap();
        assert_eq!(
            entry,
            EventEntry::Transition {
                timestamp_ms: 1700000000999,
                from: BreakerState::HalfOpen,
                to: BreakerState::Open,
            }
        );
    }

    #[test]
    fn test_short_attempt_form_parses() {
        let entry: EventEntry = "17,ATTEMPT,1,SHORT_CIRCUITED".parse().unwrap();
        assert!(matches!(
            entry,
            EventEntry::Attempt { attempt: 1, outcome: AttemptOutcome::ShortCircuited, .. }
        ));
    }

    #[test]
    fn test_malformed_lines_rejected() {
        assert!(matches!(
            "17,RESTART,1,SUCCESS".parse::<EventEntry>(),
            Err(ParseEventError::UnknownKind(_))
        ));
        assert!(matches!(
            "abc,ATTEMPT,1,SUCCESS".parse::<EventEntry>(),
            Err(ParseEventError::InvalidNumber { field: "timestamp", .. })
        ));
        assert!(matches!(
            "17,TRANSITION,CLOSED,BROKEN".parse::<EventEntry>(),
            Err(ParseEventError::UnknownState(_))
        ));
    }

    #[test]
    fn test_attempt_number_out_of_range_rejected() {
        // 2^32 + 1 would wrap to attempt 1
        assert_eq!(
            "17,ATTEMPT,4294967297,SUCCESS,0,0".parse::<EventEntry>(),
            Err(ParseEventError::InvalidNumber {
                field: "attempt",
                value: "4294967297".to_string(),
            })
        );
    }

    #[test]
    fn test_in_memory_log_preserves_order() {
        let log = EventLog::in_memory();
        log.record_attempt(1, AttemptOutcome::Failure, Duration::ZERO, Duration::from_millis(5));
        log.record_transition(BreakerState::Closed, BreakerState::Open);
        log.record_attempt(2, AttemptOutcome::ShortCircuited, Duration::ZERO, Duration::ZERO);

        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert!(matches!(entries[1], EventEntry::Transition { .. }));
        assert_eq!(log.attempts().len(), 2);
        assert_eq!(log.transitions(), vec![(BreakerState::Closed, BreakerState::Open)]);
    }

    #[test]
    fn test_concurrent_writers_never_interleave() {
        let path = std::env::temp_dir().join(format!("event-log-{}.csv", uuid::Uuid::new_v4()));
        let log = EventLog::open(&path).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        log.record_attempt(
                            t * 100 + i,
                            AttemptOutcome::Failure,
                            Duration::from_millis(10),
                            Duration::from_millis(20),
                        );
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 400);
        for line in lines {
            line.parse::<EventEntry>().unwrap();
        }
        let _ = std::fs::remove_file(&path);
    }
}
