//! Timing record subsystem.
//!
//! # Data Flow
//! ```text
//! server-timing middleware creates TimingCollection per incoming request
//!     → collection.rs (new_entry per outbound call)
//!     → entry.rs (start/stop, extra attributes)
//!     → collection.rs (merge_from: downstream metrics spliced at head)
//!     → header.rs (format into Server-Timing response header)
//! ```

pub mod collection;
pub mod entry;
pub mod header;

pub use collection::TimingCollection;
pub use entry::{EntryHandle, TimingEntry, KEY_CODE, KEY_ERROR, KEY_SOURCE};
pub use header::{format_header, parse_header, ParseError, SERVER_TIMING};
