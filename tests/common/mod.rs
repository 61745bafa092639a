//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use client_timing::client::{RoundTripResult, Transport};
use client_timing::timing::{TimingEntry, SERVER_TIMING};
use futures_util::future::BoxFuture;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Error returned by [`MockTransport`] when scripted to fail.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct MockError(pub String);

/// What the mock transport answers with.
#[derive(Debug, Clone)]
pub enum MockReply {
    Response {
        status: StatusCode,
        server_timing: Option<String>,
    },
    Error(String),
}

impl MockReply {
    pub fn ok() -> Self {
        Self::Response {
            status: StatusCode::OK,
            server_timing: None,
        }
    }

    pub fn with_timing(value: impl Into<String>) -> Self {
        Self::Response {
            status: StatusCode::OK,
            server_timing: Some(value.into()),
        }
    }
}

/// Scripted transport recording every request it receives.
#[derive(Debug)]
pub struct MockTransport {
    reply: MockReply,
    delay: Duration,
    calls: AtomicUsize,
    uris: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new(reply: MockReply) -> Self {
        Self {
            reply,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            uris: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn uris(&self) -> Vec<String> {
        self.uris.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn round_trip(&self, request: Request<Body>) -> BoxFuture<'static, RoundTripResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.uris.lock().unwrap().push(request.uri().to_string());
        let reply = self.reply.clone();
        let delay = self.delay;

        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match reply {
                MockReply::Response {
                    status,
                    server_timing,
                } => {
                    let mut builder = Response::builder().status(status);
                    if let Some(value) = server_timing {
                        builder = builder.header(SERVER_TIMING, value);
                    }
                    Ok(builder.body(Body::from("mock")).unwrap())
                }
                MockReply::Error(message) => Err(MockError(message).into()),
            }
        })
    }
}

/// Entries with durations cleared, since they change between runs.
pub fn without_durations(entries: Vec<TimingEntry>) -> Vec<TimingEntry> {
    entries
        .into_iter()
        .map(|e| e.with_duration(Duration::ZERO))
        .collect()
}

/// Start a raw HTTP backend answering every connection with a fixed response.
pub async fn start_backend(status_line: &'static str, server_timing: Option<&'static str>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let body = "backend";
                        let timing = server_timing
                            .map(|v| format!("Server-Timing: {v}\r\n"))
                            .unwrap_or_default();
                        let response = format!(
                            "HTTP/1.1 {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_line,
                            timing,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
