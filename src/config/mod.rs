//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DemoConfig (validated, immutable)
//!     → ServiceConfig::timer_options → Timer per service
//! ```
//!
//! # Design Decisions
//! - All fields have defaults; an empty file is the demo topology
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{DemoConfig, ServiceConfig, UpstreamConfig};
pub use validation::{validate_config, ValidationError};
