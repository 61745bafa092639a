//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files.
//! The default configuration reproduces the three-tier demo topology:
//!
//! ```text
//! handler ──GET /level1──▶ server1
//!    └─────GET /level1──▶ server2 ──GET /level2──▶ server1
//! ```

use serde::{Deserialize, Serialize};

use crate::client::TimerOptions;

/// Root configuration for the demo services.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Artificial latency every handler adds before calling upstreams.
    pub delay_ms: u64,

    /// Service the user is pointed at on startup.
    pub entry: String,

    /// Service definitions.
    pub services: Vec<ServiceConfig>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            delay_ms: 50,
            entry: "handler".to_string(),
            services: vec![
                ServiceConfig::new("server1", "127.0.0.1:8081"),
                ServiceConfig::new("server2", "127.0.0.1:8082").with_upstream("server1", "/level2"),
                ServiceConfig::new("handler", "0.0.0.0:8080")
                    .with_upstream("server1", "/level1")
                    .with_upstream("server2", "/level1"),
            ],
        }
    }
}

impl DemoConfig {
    /// Look up a service by name.
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }
}

/// One demo service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Unique service name.
    pub name: String,

    /// Bind address (e.g., "127.0.0.1:8081"). Port 0 picks a free port.
    pub bind_address: String,

    /// Source label recorded on outbound calls. Defaults to the service name.
    #[serde(default)]
    pub source: Option<String>,

    /// Calls made for every incoming request, in order.
    #[serde(default)]
    pub upstreams: Vec<UpstreamConfig>,

    /// Issue the upstream calls concurrently instead of one after another.
    #[serde(default)]
    pub parallel: bool,
}

impl ServiceConfig {
    pub fn new(name: impl Into<String>, bind_address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bind_address: bind_address.into(),
            source: None,
            upstreams: Vec::new(),
            parallel: false,
        }
    }

    /// Add an upstream call, builder style.
    pub fn with_upstream(mut self, service: impl Into<String>, path: impl Into<String>) -> Self {
        self.upstreams.push(UpstreamConfig {
            service: service.into(),
            path: path.into(),
        });
        self
    }

    /// Source label in effect for this service.
    pub fn source_label(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.name)
    }

    /// Timer options derived from this service's settings.
    pub fn timer_options(&self) -> TimerOptions {
        TimerOptions::new().source(self.source_label())
    }
}

/// A call from one service to another.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Name of the called service.
    pub service: String,

    /// Request path.
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_path() -> String {
    "/".to_string()
}
