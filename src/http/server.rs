//! Demo services showing timing propagation across nested calls.
//!
//! # Responsibilities
//! - Bind one listener per configured service
//! - Resolve upstream service names to the bound addresses
//! - Serve a handler that sleeps, then calls its upstreams through the
//!   instrumented client
//! - Run every service until shutdown
//!
//! Opening the entry service in a browser shows the whole call tree in the
//! developer tools' Server Timing panel.

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::future::{try_join_all, BoxFuture};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::client::{BoxError, HyperTransport, TimedClient, Timer, Transport};
use crate::config::{DemoConfig, ServiceConfig};
use crate::http::server_timing::{server_timing_middleware, Timing};
use crate::lifecycle::Shutdown;

/// Errors raised while starting or running the demo services.
#[derive(Debug, Error)]
pub enum DemoError {
    #[error("failed to bind service '{service}' on {address}: {source}")]
    Bind {
        service: String,
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("service '{service}' calls unknown service '{upstream}'")]
    UnknownUpstream { service: String, upstream: String },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// State shared by the handler of one service.
#[derive(Clone, Debug)]
pub struct ServiceState {
    /// Service name, shown in the response body.
    pub name: Arc<str>,
    /// Timer labelled with the service's source.
    pub timer: Timer,
    /// Absolute URLs called for every request.
    pub upstreams: Arc<[String]>,
    /// Artificial latency before calling upstreams.
    pub delay: Duration,
    /// Call upstreams concurrently.
    pub parallel: bool,
}

/// Build the router of one service.
pub fn build_router(state: ServiceState) -> Router {
    Router::new()
        .route("/", get(timed_handler))
        .route("/{*path}", get(timed_handler))
        .with_state(state)
        .layer(middleware::from_fn(server_timing_middleware))
        .layer(TraceLayer::new_for_http())
}

async fn timed_handler(State(state): State<ServiceState>, Timing(timing): Timing) -> Response {
    let client = state.timer.client(timing);

    tokio::time::sleep(state.delay).await;

    let result = if state.parallel {
        try_join_all(state.upstreams.iter().map(|url| fetch(&client, url)))
            .await
            .map(|_| ())
    } else {
        fetch_all(&client, &state.upstreams).await
    };

    match result {
        Ok(()) => Html(page(&state.name)).into_response(),
        Err(e) => {
            tracing::warn!(service = %state.name, error = %e, "Upstream call failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn fetch_all(client: &TimedClient, urls: &[String]) -> Result<(), BoxError> {
    for url in urls {
        fetch(client, url).await?;
    }
    Ok(())
}

async fn fetch(client: &TimedClient, url: &str) -> Result<(), BoxError> {
    let response = client.get(url).await?;
    // Drain the body so the connection goes back to the pool.
    axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(())
}

fn page(name: &str) -> String {
    format!(
        "<h1>Welcome to Server Timing Example</h1>\n\
         <p>Served by {name}</p>\n\
         <ul>\n\
         <li>Open developer tools</li>\n\
         <li>Go to the network tab</li>\n\
         <li>Refresh the page (F5)</li>\n\
         <li>Open the Timing tab of the request</li>\n\
         <li>Check out the server timing section</li>\n\
         </ul>\n"
    )
}

struct BoundService {
    name: String,
    listener: TcpListener,
    router: Router,
}

/// All demo services, bound and ready to serve.
pub struct DemoServer {
    services: Vec<BoundService>,
    addresses: HashMap<String, SocketAddr>,
}

impl DemoServer {
    /// Bind every service of `config`.
    ///
    /// All listeners are bound before any router is built so upstream URLs
    /// point at the real (possibly ephemeral) ports.
    pub async fn bind(config: &DemoConfig) -> Result<Self, DemoError> {
        let mut listeners = Vec::with_capacity(config.services.len());
        let mut addresses = HashMap::new();

        for service in &config.services {
            let listener = TcpListener::bind(&service.bind_address)
                .await
                .map_err(|source| DemoError::Bind {
                    service: service.name.clone(),
                    address: service.bind_address.clone(),
                    source,
                })?;
            addresses.insert(service.name.clone(), listener.local_addr()?);
            listeners.push((service, listener));
        }

        let transport: Arc<dyn Transport> = Arc::new(HyperTransport::new());
        let delay = Duration::from_millis(config.delay_ms);

        let mut services = Vec::with_capacity(listeners.len());
        for (service, listener) in listeners {
            let state = ServiceState {
                name: Arc::from(service.name.as_str()),
                timer: Timer::new(service.timer_options().shared_transport(transport.clone())),
                upstreams: upstream_urls(service, &addresses)?.into(),
                delay,
                parallel: service.parallel,
            };
            services.push(BoundService {
                name: service.name.clone(),
                listener,
                router: build_router(state),
            });
        }

        Ok(Self { services, addresses })
    }

    /// Address a service is listening on.
    pub fn local_addr(&self, service: &str) -> Option<SocketAddr> {
        self.addresses.get(service).copied()
    }

    /// Serve every service until `shutdown` is triggered.
    pub async fn run(self, shutdown: &Shutdown) -> Result<(), DemoError> {
        let servers = self.services.into_iter().map(|service| {
            let signal = shutdown.signal();
            let future: BoxFuture<'static, std::io::Result<()>> = Box::pin(async move {
                tracing::info!(
                    service = %service.name,
                    address = %service.listener.local_addr()?,
                    "Service listening"
                );
                axum::serve(service.listener, service.router)
                    .with_graceful_shutdown(signal)
                    .await?;
                tracing::info!(service = %service.name, "Service stopped");
                Ok(())
            });
            tokio::spawn(future)
        });

        for joined in try_join_all(servers)
            .await
            .map_err(|e| DemoError::Serve(std::io::Error::other(e)))?
        {
            joined?;
        }
        Ok(())
    }
}

fn upstream_urls(
    service: &ServiceConfig,
    addresses: &HashMap<String, SocketAddr>,
) -> Result<Vec<String>, DemoError> {
    service
        .upstreams
        .iter()
        .map(|upstream| {
            let addr = addresses
                .get(&upstream.service)
                .ok_or_else(|| DemoError::UnknownUpstream {
                    service: service.name.clone(),
                    upstream: upstream.service.clone(),
                })?;
            Ok(format!("http://{}{}", connect_addr(*addr), upstream.path))
        })
        .collect()
}

/// Unspecified bind addresses are reached through loopback.
fn connect_addr(addr: SocketAddr) -> SocketAddr {
    if addr.ip().is_unspecified() {
        let loopback = match addr {
            SocketAddr::V4(_) => std::net::Ipv4Addr::LOCALHOST.into(),
            SocketAddr::V6(_) => std::net::Ipv6Addr::LOCALHOST.into(),
        };
        SocketAddr::new(loopback, addr.port())
    } else {
        addr
    }
}
