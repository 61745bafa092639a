//! Lifecycle management for the demo services.
//!
//! # Data Flow
//! ```text
//! Ctrl+C (or test code) → Shutdown::trigger
//!     → every serving task's receiver fires
//!     → axum graceful shutdown drains in-flight requests
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
