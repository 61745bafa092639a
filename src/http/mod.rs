//! HTTP server side: the per-request timing registry and the demo services.
//!
//! # Data Flow
//! ```text
//! incoming request
//!     → server_timing.rs (bind TimingCollection, Timing extractor)
//!     → server.rs handler (Timer::client(collection), upstream calls)
//!     → server_timing.rs (collection → Server-Timing response header)
//! ```

pub mod server;
pub mod server_timing;

pub use server::{build_router, DemoError, DemoServer, ServiceState};
pub use server_timing::{server_timing_middleware, Timing};
