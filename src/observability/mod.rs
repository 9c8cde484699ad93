//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Resilience layer produces:
//!     → event_log.rs (append-only attempt/transition record)
//!         → mirrored into logging (tracing events, target "event_log")
//!         → mirrored into metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → report.rs / lab-cli (offline summary of event log files)
//!     → Log aggregation (stdout, JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Event log is the source of truth for offline analysis
//! - Structured logging (JSON) available for machine parsing
//! - Metrics are cheap and no-ops until an exporter is installed

pub mod event_log;
pub mod logging;
pub mod metrics;
pub mod report;
