//! Background worker that keeps calling the dependency.
//!
//! Each iteration makes one `call`, logs the breaker state and the result,
//! then waits `interval`. A shutdown signal interrupts either phase.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::CallError;
use crate::resilience::client::ResilienceClient;
use crate::resilience::transport::{Request, Transport};

/// Totals for one worker run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub calls: u64,
    pub successes: u64,
    pub short_circuited: u64,
    pub failures: u64,
}

pub async fn run_worker<T: Transport>(
    client: Arc<ResilienceClient<T>>,
    request: Request,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> WorkerStats {
    let mut stats = WorkerStats::default();
    tracing::info!(interval_ms = interval.as_millis() as u64, "Worker loop starting");

    loop {
        let result = tokio::select! {
            result = client.call(&request) => result,
            _ = shutdown.recv() => break,
        };

        stats.calls += 1;
        let state = client.breaker().state();
        match result {
            Ok(response) => {
                stats.successes += 1;
                tracing::info!("Breaker={} result={}", state, response.text());
            }
            Err(e) => {
                if matches!(e, CallError::CircuitOpen) {
                    stats.short_circuited += 1;
                    tracing::warn!("Breaker OPEN: fast-fail without calling backend");
                } else {
                    stats.failures += 1;
                }
                tracing::info!("Breaker={} result={{'error': '{}'}}", state, e);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.recv() => break,
        }
    }

    tracing::info!(
        calls = stats.calls,
        successes = stats.successes,
        short_circuited = stats.short_circuited,
        failures = stats.failures,
        "Worker loop stopped"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LabConfig;
    use crate::lifecycle::Shutdown;
    use crate::observability::event_log::EventLog;
    use crate::simulator::{FaultPolicy, FaultSimulator};

    #[tokio::test(start_paused = true)]
    async fn test_worker_stops_on_shutdown() {
        let client = Arc::new(ResilienceClient::from_config(
            &LabConfig::default(),
            FaultSimulator::new(FaultPolicy::healthy()),
            EventLog::in_memory(),
        ));
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(run_worker(
            client,
            Request::default(),
            Duration::from_millis(300),
            shutdown.subscribe(),
        ));

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        shutdown.trigger();
        let stats = handle.await.unwrap();

        assert!(stats.calls >= 3, "got {:?}", stats);
        assert_eq!(stats.calls, stats.successes);
    }
}
