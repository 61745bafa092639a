//! End-to-end propagation through real HTTP services.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use client_timing::client::{normalize_name, Timer, TimerOptions};
use client_timing::config::{DemoConfig, ServiceConfig};
use client_timing::http::{build_router, DemoServer, ServiceState};
use client_timing::lifecycle::Shutdown;
use client_timing::timing::{parse_header, TimingCollection, TimingEntry};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

mod common;

use common::without_durations;

fn topology(parallel: bool) -> DemoConfig {
    let mut handler = ServiceConfig::new("handler", "127.0.0.1:0")
        .with_upstream("server1", "/level1")
        .with_upstream("server2", "/level1");
    handler.parallel = parallel;

    DemoConfig {
        delay_ms: 50,
        entry: "handler".into(),
        services: vec![
            ServiceConfig::new("server1", "127.0.0.1:0"),
            ServiceConfig::new("server2", "127.0.0.1:0").with_upstream("server1", "/level2"),
            handler,
        ],
    }
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

fn metric_name(addr: SocketAddr) -> String {
    normalize_name(&addr.to_string())
}

/// Serve `config`, GET `path` on the entry service and return the parsed
/// `Server-Timing` header.
async fn fetch_timing(config: DemoConfig, path: &str) -> (Vec<TimingEntry>, SocketAddr, SocketAddr) {
    let server = DemoServer::bind(&config).await.unwrap();
    let s1 = server.local_addr("server1").unwrap();
    let s2 = server.local_addr("server2").unwrap();
    let entry = server.local_addr(&config.entry).unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(&server_shutdown).await;
    });

    let response = http_client().get(format!("http://{entry}{path}")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let header = response
        .headers()
        .get("server-timing")
        .expect("entry service should report timing")
        .to_str()
        .unwrap()
        .to_string();

    shutdown.trigger();
    (parse_header(&header).unwrap(), s1, s2)
}

fn expected(s1: SocketAddr, s2: SocketAddr) -> Vec<TimingEntry> {
    vec![
        TimingEntry::new(metric_name(s1), "GET /level2")
            .with_extra("code", "200")
            .with_extra("source", "server2"),
        TimingEntry::new(metric_name(s1), "GET /level1")
            .with_extra("code", "200")
            .with_extra("source", "handler"),
        TimingEntry::new(metric_name(s2), "GET /level1")
            .with_extra("code", "200")
            .with_extra("source", "handler"),
    ]
}

#[tokio::test]
async fn test_nested_waterfall() {
    let (entries, s1, s2) = fetch_timing(topology(false), "/level0").await;

    // Every hop sleeps 50ms before answering.
    assert!(entries.iter().all(|e| e.duration >= Duration::from_millis(50)));
    // server2 waits for its own call to server1 on top of that.
    assert!(entries[2].duration >= Duration::from_millis(100));

    assert_eq!(without_durations(entries), expected(s1, s2));
}

#[tokio::test]
async fn test_parallel_fan_out_keeps_nested_first() {
    let (entries, s1, s2) = fetch_timing(topology(true), "/").await;
    let entries = without_durations(entries);
    let expected = expected(s1, s2);

    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0], expected[0]);
    assert!(entries[1..].contains(&expected[1]));
    assert!(entries[1..].contains(&expected[2]));
}

#[tokio::test]
async fn test_leaf_service_sends_no_header() {
    let config = DemoConfig {
        delay_ms: 0,
        entry: "leaf".into(),
        services: vec![ServiceConfig::new("leaf", "127.0.0.1:0")],
    };
    let server = DemoServer::bind(&config).await.unwrap();
    let addr = server.local_addr("leaf").unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(&server_shutdown).await;
    });

    let response = http_client().get(format!("http://{addr}/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().get("server-timing").is_none());
    shutdown.trigger();
}

#[tokio::test]
async fn test_hyper_transport_merges_backend_header() {
    let backend = common::start_backend("200 OK", Some(r#"db;desc="SELECT 1";dur=3.5"#)).await;
    let timer = Timer::new(TimerOptions::new().source("api"));
    let timing = Arc::new(TimingCollection::new());

    let response = timer
        .client(timing.clone())
        .get(&format!("http://{backend}/users?id=7"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    assert_eq!(
        without_durations(timing.snapshot()),
        vec![
            TimingEntry::new("db", "SELECT 1"),
            TimingEntry::new(metric_name(backend), "GET /users")
                .with_extra("code", "200")
                .with_extra("source", "api"),
        ]
    );
    assert_eq!(timing.snapshot()[0].duration, Duration::from_micros(3_500));
}

#[tokio::test]
async fn test_hyper_transport_connection_error() {
    let addr = common::closed_addr().await;
    let timer = Timer::new(TimerOptions::new());
    let timing = Arc::new(TimingCollection::new());

    let err = timer
        .client(timing.clone())
        .get(&format!("http://{addr}/"))
        .await
        .unwrap_err();

    let entries = timing.snapshot();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].extra["error"], err.to_string());
    assert!(!entries[0].extra.contains_key("code"));
}

#[tokio::test]
async fn test_upstream_failure_returns_500() {
    let closed = common::closed_addr().await;
    let state = ServiceState {
        name: Arc::from("front"),
        timer: Timer::new(TimerOptions::new().source("front")),
        upstreams: vec![format!("http://{closed}/down")].into(),
        delay: Duration::ZERO,
        parallel: false,
    };

    let response = build_router(state)
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // The failed call is still reported.
    let header = response.headers().get("server-timing").unwrap().to_str().unwrap();
    let entries = parse_header(header).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].desc, "GET /down");
    assert_eq!(entries[0].extra["source"], "front");
    assert!(entries[0].extra.contains_key("error"));
}
