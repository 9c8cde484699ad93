//! HTTP front for the fault simulator.
//!
//! # Routes
//! - `GET /work`: simulated work, 200 JSON or 500 "backend error"
//! - `GET /health`: always 200; liveness of the process, not of `/work`

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::SimulatorConfig;
use crate::error::CallError;
use crate::resilience::transport::Request;
use crate::simulator::{FaultPolicy, FaultSimulator};

/// Fault simulator HTTP server.
pub struct SimulatorServer {
    simulator: Arc<FaultSimulator>,
}

impl SimulatorServer {
    pub fn new(config: &SimulatorConfig) -> Self {
        let policy = FaultPolicy::from_config(config);
        let simulator = match config.seed {
            Some(seed) => FaultSimulator::with_seed(policy, seed),
            None => FaultSimulator::new(policy),
        };
        Self::from_simulator(Arc::new(simulator))
    }

    pub fn from_simulator(simulator: Arc<FaultSimulator>) -> Self {
        Self { simulator }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/work", get(work_handler))
            .route("/health", get(|| async { "ok" }))
            .with_state(self.simulator.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            policy = ?self.simulator.policy(),
            "Fault simulator listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!(address = %addr, "Fault simulator stopped");
        Ok(())
    }
}

async fn work_handler(State(simulator): State<Arc<FaultSimulator>>) -> Response {
    let request = Request::get("/work");
    match simulator.handle(&request).await {
        Ok(response) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            response.body,
        )
            .into_response(),
        Err(CallError::Remote { status }) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, "backend error").into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
