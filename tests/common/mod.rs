//! Shared utilities for integration and load testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

use resilience_lab::config::LabConfig;
use resilience_lab::lifecycle::Shutdown;
use resilience_lab::observability::event_log::EventLog;
use resilience_lab::resilience::{HttpTransport, ResilienceClient, Transport};
use resilience_lab::simulator::{FaultPolicy, FaultSimulator, SimulatorServer};

/// A fault simulator served over HTTP, stoppable on demand.
#[allow(dead_code)]
pub struct RunningSimulator {
    pub addr: SocketAddr,
    shutdown: Shutdown,
    handle: JoinHandle<Result<(), std::io::Error>>,
}

#[allow(dead_code)]
impl RunningSimulator {
    pub fn work_url(&self) -> Url {
        Url::parse(&format!("http://{}/work", self.addr)).unwrap()
    }

    /// Stop serving and wait until the port is closed.
    pub async fn stop(self) {
        self.shutdown.trigger();
        self.handle.await.unwrap().unwrap();
    }
}

/// Serve `simulator` on `addr` (port 0 picks a free one).
#[allow(dead_code)]
pub async fn start_simulator(addr: SocketAddr, simulator: FaultSimulator) -> RunningSimulator {
    let listener = TcpListener::bind(addr).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = SimulatorServer::from_simulator(Arc::new(simulator));
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));
    RunningSimulator { addr, shutdown, handle }
}

#[allow(dead_code)]
pub async fn start_healthy_simulator() -> RunningSimulator {
    start_simulator(
        "127.0.0.1:0".parse().unwrap(),
        FaultSimulator::new(FaultPolicy::healthy()),
    )
    .await
}

/// Start a programmable raw HTTP backend; returns its address.
#[allow(dead_code)]
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let (status, body) = f().await;
                let status_text = match status {
                    200 => "200 OK",
                    500 => "500 Internal Server Error",
                    502 => "502 Bad Gateway",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Lab config tuned for fast tests: no jitter, short backoff and reset.
#[allow(dead_code)]
pub fn fast_config(failure_threshold: u32, max_attempts: u32) -> LabConfig {
    let mut config = LabConfig::default();
    config.breaker.failure_threshold = failure_threshold;
    config.breaker.reset_timeout_ms = 400;
    config.retry.max_attempts = max_attempts;
    config.retry.base_delay_ms = 20;
    config.retry.cap_delay_ms = 100;
    config.retry.jitter_span_ms = 0;
    config.client.attempt_timeout_ms = 1_000;
    config
}

#[allow(dead_code)]
pub fn http_client(config: &LabConfig, url: Url) -> (ResilienceClient<HttpTransport>, EventLog) {
    let log = EventLog::in_memory();
    let transport = HttpTransport::with_connect_timeout(url, Duration::from_millis(500)).unwrap();
    (ResilienceClient::from_config(config, transport, log.clone()), log)
}

/// Client over any transport, sharing the lab config's breaker and retry settings.
#[allow(dead_code)]
pub fn client_over<T: Transport>(config: &LabConfig, transport: T) -> (ResilienceClient<T>, EventLog) {
    let log = EventLog::in_memory();
    (ResilienceClient::from_config(config, transport, log.clone()), log)
}
