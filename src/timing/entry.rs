//! A single measured operation.
//!
//! # Responsibilities
//! - Hold the name, description, duration and extra attributes of one metric
//! - Provide a shared handle that outbound calls write into while the
//!   owning collection keeps its position in the ordered list
//! - Track the start/stop lifecycle with a monotonic clock

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Extra attribute holding the caller's source label.
pub const KEY_SOURCE: &str = "source";

/// Extra attribute holding the response status code.
pub const KEY_CODE: &str = "code";

/// Extra attribute holding the transport error message.
pub const KEY_ERROR: &str = "error";

/// One timing metric as it appears in a `Server-Timing` header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimingEntry {
    /// Metric name (must be a header token).
    pub name: String,
    /// Free-text description.
    pub desc: String,
    /// Elapsed time. Zero until the operation stops.
    pub duration: Duration,
    /// Arbitrary outcome metadata.
    pub extra: BTreeMap<String, String>,
}

impl TimingEntry {
    /// Create an entry with no duration and no extra attributes.
    pub fn new(name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            desc: desc.into(),
            duration: Duration::ZERO,
            extra: BTreeMap::new(),
        }
    }

    /// Set an extra attribute, builder style.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Set the duration, builder style.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

#[derive(Debug)]
struct EntryState {
    entry: TimingEntry,
    started: Option<Instant>,
}

/// Shared handle to an entry living inside a [`TimingCollection`].
///
/// Cloning the handle does not copy the entry; every clone writes into the
/// same slot of the collection.
///
/// [`TimingCollection`]: crate::timing::TimingCollection
#[derive(Debug, Clone)]
pub struct EntryHandle {
    state: Arc<Mutex<EntryState>>,
}

impl EntryHandle {
    pub(crate) fn new(entry: TimingEntry) -> Self {
        Self {
            state: Arc::new(Mutex::new(EntryState {
                entry,
                started: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EntryState> {
        // A panicking update fn must not take the whole request down with it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the entry started.
    pub fn start(&self) -> &Self {
        self.lock().started = Some(Instant::now());
        self
    }

    /// Mark the entry stopped and record the elapsed time.
    ///
    /// Stopping an entry that was never started leaves its duration at zero.
    pub fn stop(&self) -> &Self {
        let mut state = self.lock();
        if let Some(started) = state.started {
            state.entry.duration = started.elapsed();
        }
        self
    }

    /// Set an extra attribute.
    pub fn set_extra(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock().entry.extra.insert(key.into(), value.into());
    }

    /// Read an extra attribute.
    pub fn extra(&self, key: &str) -> Option<String> {
        self.lock().entry.extra.get(key).cloned()
    }

    /// Replace the description.
    pub fn set_desc(&self, desc: impl Into<String>) {
        self.lock().entry.desc = desc.into();
    }

    /// Elapsed time recorded by [`stop`](Self::stop).
    pub fn duration(&self) -> Duration {
        self.lock().entry.duration
    }

    /// Copy of the entry as it currently stands.
    pub fn snapshot(&self) -> TimingEntry {
        self.lock().entry.clone()
    }

    #[cfg(test)]
    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}
