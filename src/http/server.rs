//! HTTP server setup for the client service.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request timeout)
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::LabConfig;
use crate::http::handlers;
use crate::resilience::client::ResilienceClient;
use crate::resilience::transport::Transport;

/// Application state injected into handlers.
pub struct AppState<T> {
    pub client: Arc<ResilienceClient<T>>,
    pub config: Arc<LabConfig>,
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
        }
    }
}

/// HTTP server exposing the client's health and an on-demand call.
pub struct ClientServer {
    router: Router,
}

impl<T: Transport + 'static> From<AppState<T>> for ClientServer {
    fn from(state: AppState<T>) -> Self {
        Self::new(state)
    }
}

impl ClientServer {
    pub fn new<T: Transport + 'static>(state: AppState<T>) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router<T: Transport + 'static>(state: AppState<T>) -> Router {
        // A call can take every attempt's deadline plus every backoff.
        let budget = call_budget(&state.config);
        Router::new()
            .route("/", get(handlers::root))
            .route("/health", get(handlers::health::<T>))
            .route("/call", get(handlers::call_backend::<T>))
            .with_state(state)
            .layer(TimeoutLayer::new(budget))
            .layer(TraceLayer::new_for_http())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Client HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Client HTTP server stopped");
        Ok(())
    }
}

fn call_budget(config: &LabConfig) -> Duration {
    let attempts = config.retry.max_attempts.max(1);
    let per_attempt = config.client.attempt_timeout_ms + config.retry.cap_delay_ms + config.retry.jitter_span_ms;
    Duration::from_millis(per_attempt.saturating_mul(u64::from(attempts)) + 1_000)
}
