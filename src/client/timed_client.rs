//! HTTP client built on a [`TimedTransport`].

use axum::body::Body;
use axum::http::{Request, Response};
use std::sync::Arc;

use crate::client::transport::{BoxError, TimedTransport, Transport};
use crate::timing::TimingCollection;

/// A client whose every request is recorded into one timing collection.
#[derive(Clone, Debug)]
pub struct TimedClient {
    transport: TimedTransport,
}

impl TimedClient {
    pub fn new(transport: TimedTransport) -> Self {
        Self { transport }
    }

    /// Send a request.
    pub async fn request(&self, request: Request<Body>) -> Result<Response<Body>, BoxError> {
        self.transport.round_trip(request).await
    }

    /// Send a `GET` request with an empty body.
    pub async fn get(&self, uri: &str) -> Result<Response<Body>, BoxError> {
        let request = Request::get(uri).body(Body::empty())?;
        self.request(request).await
    }

    /// The collection this client records into.
    pub fn timing(&self) -> &Arc<TimingCollection> {
        self.transport.timing()
    }

    /// The underlying transport, e.g. to hand to code expecting a tower service.
    pub fn transport(&self) -> &TimedTransport {
        &self.transport
    }
}
