//! Failure injection tests against a real HTTP dependency.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use resilience_lab::chaos::OutageSwitch;
use resilience_lab::http::{AppState, ClientServer};
use resilience_lab::lifecycle::Shutdown;
use resilience_lab::resilience::{BreakerState, HttpTransport, Request};
use resilience_lab::simulator::{FaultPolicy, FaultSimulator};
use resilience_lab::{CallError, ErrorKind};

mod common;

#[tokio::test]
async fn test_retry_until_backend_answers() {
    let call_count = Arc::new(AtomicU32::new(0));
    let cc = call_count.clone();
    let backend = common::start_programmable_backend(move || {
        let cc = cc.clone();
        async move {
            if cc.fetch_add(1, Ordering::SeqCst) < 2 {
                (503, "Service Unavailable".into())
            } else {
                (200, "{\"ok\":true}".into())
            }
        }
    })
    .await;

    let config = common::fast_config(5, 3);
    let (client, log) = common::http_client(&config, Url::parse(&format!("http://{}/work", backend)).unwrap());

    let response = client.call(&Request::default()).await.expect("third attempt should succeed");

    assert_eq!(response.json().unwrap()["ok"], true);
    assert_eq!(call_count.load(Ordering::SeqCst), 3);
    assert_eq!(log.attempts().len(), 3);
    assert_eq!(client.breaker().state(), BreakerState::Closed);
}

#[tokio::test]
async fn test_breaker_opens_when_dependency_dies_and_closes_after_restart() {
    let simulator = common::start_healthy_simulator().await;
    let addr = simulator.addr;
    let config = common::fast_config(3, 1);
    let (client, log) = common::http_client(&config, simulator.work_url());

    assert!(client.call(&Request::default()).await.is_ok());

    simulator.stop().await;
    for _ in 0..3 {
        let err = client.call(&Request::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionError, "unexpected error: {}", err);
    }
    assert_eq!(client.breaker().state(), BreakerState::Open);
    assert_eq!(client.call(&Request::default()).await, Err(CallError::CircuitOpen));

    let restarted = common::start_simulator(addr, FaultSimulator::new(FaultPolicy::healthy())).await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(client.call(&Request::default()).await.is_ok());
    assert_eq!(client.breaker().state(), BreakerState::Closed);
    assert_eq!(
        log.transitions(),
        vec![
            (BreakerState::Closed, BreakerState::Open),
            (BreakerState::Open, BreakerState::HalfOpen),
            (BreakerState::HalfOpen, BreakerState::Closed),
        ]
    );

    restarted.stop().await;
}

#[tokio::test]
async fn test_failed_probe_reopens_breaker() {
    let simulator = common::start_simulator(
        "127.0.0.1:0".parse().unwrap(),
        FaultSimulator::new(FaultPolicy {
            failure_probability: 1.0,
            ..FaultPolicy::healthy()
        }),
    )
    .await;
    let config = common::fast_config(2, 1);
    let (client, log) = common::http_client(&config, simulator.work_url());

    for _ in 0..2 {
        assert_eq!(
            client.call(&Request::default()).await,
            Err(CallError::Remote { status: 500 })
        );
    }
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(
        client.call(&Request::default()).await,
        Err(CallError::Remote { status: 500 })
    );

    assert_eq!(client.breaker().state(), BreakerState::Open);
    assert_eq!(
        log.transitions(),
        vec![
            (BreakerState::Closed, BreakerState::Open),
            (BreakerState::Open, BreakerState::HalfOpen),
            (BreakerState::HalfOpen, BreakerState::Open),
        ]
    );

    simulator.stop().await;
}

#[tokio::test]
async fn test_injected_outage_is_survived() {
    let simulator = common::start_healthy_simulator().await;
    let transport = HttpTransport::new(simulator.work_url()).unwrap();
    let switch = OutageSwitch::new(Arc::new(transport));
    let config = common::fast_config(2, 2);
    let (client, _log) = common::client_over(&config, switch.clone());

    switch.engage();
    let err = client.call(&Request::default()).await.unwrap_err();
    assert!(matches!(err, CallError::Connection { .. }));
    assert_eq!(client.breaker().state(), BreakerState::Open);
    assert_eq!(client.call(&Request::default()).await, Err(CallError::CircuitOpen));

    switch.release();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(client.call(&Request::default()).await.is_ok());
    assert_eq!(client.breaker().state(), BreakerState::Closed);

    simulator.stop().await;
}

#[tokio::test]
async fn test_client_service_reports_open_breaker() {
    let backend = common::start_programmable_backend(|| async { (500, "backend error".into()) }).await;
    let mut config = common::fast_config(1, 1);
    config.client.backend_url = format!("http://{}/work", backend);
    config.breaker.reset_timeout_ms = 60_000;
    let config = Arc::new(config);
    let (client, _log) = common::http_client(&config, Url::parse(&config.client.backend_url).unwrap());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let service = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = ClientServer::new(AppState {
        client: Arc::new(client),
        config: config.clone(),
    });
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    let http = reqwest::Client::builder().no_proxy().build().unwrap();

    let res = http.get(format!("http://{}/call", service)).send().await.unwrap();
    assert_eq!(res.status(), 502);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["kind"], "REMOTE_ERROR");

    let res = http.get(format!("http://{}/call", service)).send().await.unwrap();
    assert_eq!(res.status(), 503);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["kind"], "CIRCUIT_OPEN");

    let health: serde_json::Value = http
        .get(format!("http://{}/health", service))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["breaker_state"], "OPEN");
    assert_eq!(health["config"]["breaker"]["failure_threshold"], 1);

    shutdown.trigger();
}
