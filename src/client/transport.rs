//! Outbound transports and the timing decorator.
//!
//! # Responsibilities
//! - Define the single-operation [`Transport`] capability
//! - Provide the hyper-based default transport
//! - Adapt any cloneable tower service into a transport
//! - Decorate a transport with per-call timing ([`TimedTransport`])
//!
//! # Design Decisions
//! - Errors are `BoxError`, passed through untouched
//! - The decorator never retries, times out or pools; that belongs to the
//!   inner transport
//! - Instrumentation failures are absorbed and never change the outcome

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use futures_util::TryFutureExt;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Service, ServiceExt};

use crate::client::timer::Timer;
use crate::timing::{TimingCollection, KEY_SOURCE};

/// Type-erased error returned by transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of one round trip.
pub type RoundTripResult = Result<Response<Body>, BoxError>;

/// Something that executes one HTTP request and yields one response.
pub trait Transport: Send + Sync + 'static {
    /// Execute `request` exactly once.
    fn round_trip(&self, request: Request<Body>) -> BoxFuture<'static, RoundTripResult>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn round_trip(&self, request: Request<Body>) -> BoxFuture<'static, RoundTripResult> {
        (**self).round_trip(request)
    }
}

/// Default transport backed by the hyper-util pooled client.
#[derive(Clone, Debug)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
}

impl HyperTransport {
    /// Create a transport with a fresh connection pool.
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }

    /// Wrap an existing client.
    pub fn from_client(client: Client<HttpConnector, Body>) -> Self {
        Self { client }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HyperTransport {
    fn round_trip(&self, request: Request<Body>) -> BoxFuture<'static, RoundTripResult> {
        Box::pin(
            self.client
                .request(request)
                .map_ok(|response: Response<Incoming>| response.map(Body::new))
                .map_err(BoxError::from),
        )
    }
}

/// Adapter turning a cloneable tower service into a [`Transport`].
#[derive(Clone, Debug)]
pub struct ServiceTransport<S> {
    service: S,
}

impl<S> ServiceTransport<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

impl<S> Transport for ServiceTransport<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
{
    fn round_trip(&self, request: Request<Body>) -> BoxFuture<'static, RoundTripResult> {
        let service = self.service.clone();
        Box::pin(async move { service.oneshot(request).await.map_err(Into::into) })
    }
}

/// A transport that records every call into a [`TimingCollection`].
///
/// Created by [`Timer::transport`]; bound to exactly one collection.
#[derive(Clone)]
pub struct TimedTransport {
    timer: Timer,
    timing: Arc<TimingCollection>,
}

impl TimedTransport {
    pub(crate) fn new(timer: Timer, timing: Arc<TimingCollection>) -> Self {
        Self { timer, timing }
    }

    /// The collection this transport records into.
    pub fn timing(&self) -> &Arc<TimingCollection> {
        &self.timing
    }

    /// The configuration in effect for this transport.
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    async fn timed_round_trip(self, request: Request<Body>) -> RoundTripResult {
        let name = self.timer.metric_name(&request);
        let desc = self.timer.description(&request);
        let entry = self.timing.new_entry(name.clone(), desc);

        if let Some(source) = self.timer.source().filter(|s| !s.is_empty()) {
            entry.set_extra(KEY_SOURCE, source);
        }

        entry.start();
        let result = self.timer.inner().round_trip(request).await;
        entry.stop();

        self.timer.apply_update(&entry, &result);

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(name = %name, error = %e, "Outbound call failed");
                return Err(e);
            }
        };
        let merged = self.timing.merge_headers(response.headers());

        tracing::trace!(
            name = %name,
            status = %response.status(),
            elapsed = ?entry.duration(),
            merged,
            "Outbound call recorded"
        );

        Ok(response)
    }
}

impl Transport for TimedTransport {
    fn round_trip(&self, request: Request<Body>) -> BoxFuture<'static, RoundTripResult> {
        Box::pin(self.clone().timed_round_trip(request))
    }
}

impl Service<Request<Body>> for TimedTransport {
    type Response = Response<Body>;
    type Error = BoxError;
    type Future = BoxFuture<'static, RoundTripResult>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        Transport::round_trip(self, request)
    }
}

impl std::fmt::Debug for TimedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedTransport")
            .field("timer", &self.timer)
            .field("entries", &self.timing.len())
            .finish()
    }
}
