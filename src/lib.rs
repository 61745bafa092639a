//! Server-Timing propagation for outbound HTTP calls.
//!
//! Every outbound call made through a [`Timer`]'s transport is recorded into
//! the timing collection of the incoming request being served. Timing data
//! returned by the called service is spliced in front of the existing
//! entries, so the final `Server-Timing` header reads as a causal waterfall
//! of nested calls.

pub mod client;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod timing;

pub use client::{TimedClient, TimedTransport, Timer, TimerOptions, Transport};
pub use http::{server_timing_middleware, Timing};
pub use timing::{EntryHandle, TimingCollection, TimingEntry};
