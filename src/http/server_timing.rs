//! Per-request timing registry.
//!
//! # Responsibilities
//! - Create one [`TimingCollection`] for every incoming request
//! - Hand it to handlers explicitly through the [`Timing`] extractor
//! - Serialize it into the `Server-Timing` response header
//!
//! # Design Decisions
//! - No header is written when nothing was recorded
//! - Existing `Server-Timing` values set by the handler are kept; ours is
//!   appended as another line

use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use std::ops::Deref;
use std::sync::Arc;

use crate::timing::{TimingCollection, SERVER_TIMING};

/// The timing collection bound to the current incoming request.
#[derive(Clone, Debug)]
pub struct Timing(pub Arc<TimingCollection>);

impl Deref for Timing {
    type Target = Arc<TimingCollection>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Timing
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Timing>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Server-Timing middleware is not installed",
        ))
    }
}

/// Middleware binding a fresh collection to the request and writing it
/// into the response.
pub async fn server_timing_middleware(mut request: Request, next: Next) -> Response {
    let timing = Arc::new(TimingCollection::new());
    request.extensions_mut().insert(Timing(timing.clone()));

    let mut response = next.run(request).await;

    if timing.is_empty() {
        return response;
    }

    let value = timing.header_value();
    match HeaderValue::from_bytes(value.as_bytes()) {
        Ok(header) => {
            tracing::trace!(server_timing = %value, "Writing Server-Timing header");
            response.headers_mut().append(SERVER_TIMING, header);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Server-Timing value is not a valid header");
        }
    }
    response
}
