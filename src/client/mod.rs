//! Instrumented outbound HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! Timer (built once from TimerOptions)
//!     → Timer::transport(collection) / Timer::client(collection)
//!     → TimedTransport::round_trip
//!         → collection.new_entry(metric(req), desc(req)), source extra
//!         → inner Transport (hyper client by default)
//!         → entry.stop(), update(entry, outcome)
//!         → collection.merge_headers(response Server-Timing)
//!     → response or error returned unchanged
//! ```
//!
//! # Design Decisions
//! - The collection is passed explicitly; nothing is looked up implicitly
//! - Per-call options are applied to a copy of the timer
//! - Every option has a default, there is no unconfigured state

pub mod defaults;
pub mod timed_client;
pub mod timer;
pub mod transport;

pub use defaults::{default_desc, default_metric, default_update, normalize_name};
pub use timed_client::TimedClient;
pub use timer::{NameFn, Timer, TimerOptions, UpdateFn};
pub use transport::{
    BoxError, HyperTransport, RoundTripResult, ServiceTransport, TimedTransport, Transport,
};
