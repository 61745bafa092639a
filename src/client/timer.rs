//! Timer configuration and construction of instrumented transports.
//!
//! A [`Timer`] is built once (typically at service start) from
//! [`TimerOptions`]. For every incoming request it hands out transports and
//! clients bound to that request's [`TimingCollection`]. Per-call overrides
//! are applied to a copy, so the shared timer never changes.

use axum::body::Body;
use axum::http::Request;
use std::sync::Arc;

use crate::client::defaults::{default_desc, default_metric, default_update};
use crate::client::timed_client::TimedClient;
use crate::client::transport::{HyperTransport, RoundTripResult, TimedTransport, Transport};
use crate::timing::{EntryHandle, TimingCollection};

/// Derives a string (metric name or description) from a request.
pub type NameFn = Arc<dyn Fn(&Request<Body>) -> String + Send + Sync>;

/// Updates an entry from the outcome of the round trip.
pub type UpdateFn = Arc<dyn Fn(&EntryHandle, &RoundTripResult) + Send + Sync>;

/// Named, individually optional settings for a [`Timer`].
///
/// Unset fields keep the default (when building a timer) or the base
/// timer's value (when used as per-call overrides).
#[derive(Clone, Default)]
pub struct TimerOptions {
    transport: Option<Arc<dyn Transport>>,
    metric: Option<NameFn>,
    desc: Option<NameFn>,
    update: Option<UpdateFn>,
    source: Option<String>,
}

impl TimerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label recorded as the `source` extra of every entry.
    pub fn source(mut self, name: impl Into<String>) -> Self {
        self.source = Some(name.into());
        self
    }

    /// Inner transport that actually performs the requests.
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Inner transport, already shared.
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Function naming the metric from the request.
    pub fn metric<F>(mut self, metric: F) -> Self
    where
        F: Fn(&Request<Body>) -> String + Send + Sync + 'static,
    {
        self.metric = Some(Arc::new(metric));
        self
    }

    /// Function describing the metric from the request.
    pub fn desc<F>(mut self, desc: F) -> Self
    where
        F: Fn(&Request<Body>) -> String + Send + Sync + 'static,
    {
        self.desc = Some(Arc::new(desc));
        self
    }

    /// Function updating the entry from the response or error.
    pub fn update<F>(mut self, update: F) -> Self
    where
        F: Fn(&EntryHandle, &RoundTripResult) + Send + Sync + 'static,
    {
        self.update = Some(Arc::new(update));
        self
    }

    fn apply(self, timer: &mut Timer) {
        if let Some(transport) = self.transport {
            timer.inner = transport;
        }
        if let Some(metric) = self.metric {
            timer.metric = metric;
        }
        if let Some(desc) = self.desc {
            timer.desc = desc;
        }
        if let Some(update) = self.update {
            timer.update = update;
        }
        if let Some(source) = self.source {
            timer.source = Some(source);
        }
    }
}

impl std::fmt::Debug for TimerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerOptions")
            .field("transport", &self.transport.is_some())
            .field("metric", &self.metric.is_some())
            .field("desc", &self.desc.is_some())
            .field("update", &self.update.is_some())
            .field("source", &self.source)
            .finish()
    }
}

/// Constructs server-timing instrumented transports and clients.
#[derive(Clone)]
pub struct Timer {
    inner: Arc<dyn Transport>,
    metric: NameFn,
    desc: NameFn,
    update: UpdateFn,
    source: Option<String>,
}

impl Timer {
    /// Build a timer, filling unset options with the defaults.
    pub fn new(mut options: TimerOptions) -> Self {
        let inner = options
            .transport
            .take()
            .unwrap_or_else(|| Arc::new(HyperTransport::new()));

        let mut timer = Self {
            inner,
            metric: Arc::new(default_metric),
            desc: Arc::new(default_desc),
            update: Arc::new(default_update),
            source: None,
        };
        options.apply(&mut timer);
        timer
    }

    /// Copy of this timer with `overrides` applied.
    pub fn with_overrides(&self, overrides: TimerOptions) -> Self {
        let mut timer = self.clone();
        overrides.apply(&mut timer);
        timer
    }

    /// Transport recording into `timing`.
    pub fn transport(&self, timing: Arc<TimingCollection>) -> TimedTransport {
        TimedTransport::new(self.clone(), timing)
    }

    /// Transport recording into `timing`, with per-call overrides.
    pub fn transport_with(
        &self,
        timing: Arc<TimingCollection>,
        overrides: TimerOptions,
    ) -> TimedTransport {
        TimedTransport::new(self.with_overrides(overrides), timing)
    }

    /// Client recording into `timing`.
    pub fn client(&self, timing: Arc<TimingCollection>) -> TimedClient {
        TimedClient::new(self.transport(timing))
    }

    /// Client recording into `timing`, with per-call overrides.
    pub fn client_with(&self, timing: Arc<TimingCollection>, overrides: TimerOptions) -> TimedClient {
        TimedClient::new(self.transport_with(timing, overrides))
    }

    /// The configured source label.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub(crate) fn inner(&self) -> &Arc<dyn Transport> {
        &self.inner
    }

    pub(crate) fn metric_name(&self, request: &Request<Body>) -> String {
        (self.metric)(request)
    }

    pub(crate) fn description(&self, request: &Request<Body>) -> String {
        (self.desc)(request)
    }

    pub(crate) fn apply_update(&self, entry: &EntryHandle, result: &RoundTripResult) {
        (self.update)(entry, result)
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new(TimerOptions::default())
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer").field("source", &self.source).finish_non_exhaustive()
    }
}
