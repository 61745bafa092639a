//! Observability subsystem.
//!
//! The library itself only emits `tracing` events (outbound calls at
//! `trace`, discarded downstream headers at `debug`); binaries decide where
//! they go through [`logging::init_logging`].

pub mod logging;

pub use logging::init_logging;
