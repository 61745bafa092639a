//! Ordered, synchronized list of timing entries for one incoming request.
//!
//! # Responsibilities
//! - Append new entries for outbound calls
//! - Splice metrics recovered from downstream responses ahead of the
//!   entries already present (they happened first)
//! - Serialize the whole list into one `Server-Timing` value
//!
//! # Design Decisions
//! - A single mutex guards the list; append and splice are atomic
//! - Parsing happens outside the lock, the splice point is taken under it
//! - Malformed downstream headers are dropped, never surfaced

use axum::http::HeaderMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::timing::entry::{EntryHandle, TimingEntry};
use crate::timing::header::{format_header, parse_header, SERVER_TIMING};

/// The timing record of one incoming request.
#[derive(Debug, Default)]
pub struct TimingCollection {
    entries: Mutex<Vec<EntryHandle>>,
}

impl TimingCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<EntryHandle>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a new, not yet started entry and return its handle.
    pub fn new_entry(&self, name: impl Into<String>, desc: impl Into<String>) -> EntryHandle {
        let handle = EntryHandle::new(TimingEntry::new(name, desc));
        self.lock().push(handle.clone());
        handle
    }

    /// Insert already-built entries before everything currently present.
    pub fn prepend(&self, entries: Vec<TimingEntry>) {
        if entries.is_empty() {
            return;
        }
        let handles: Vec<_> = entries.into_iter().map(EntryHandle::new).collect();
        let mut current = self.lock();
        current.splice(0..0, handles);
    }

    /// Parse a `Server-Timing` value and splice its metrics at the head.
    ///
    /// Returns the number of merged metrics; a malformed value merges none.
    pub fn merge_from(&self, value: &str) -> usize {
        match parse_header(value) {
            Ok(entries) => {
                let merged = entries.len();
                self.prepend(entries);
                merged
            }
            Err(e) => {
                tracing::debug!(error = %e, "Discarding malformed Server-Timing header");
                0
            }
        }
    }

    /// Merge every `Server-Timing` value present in `headers`.
    ///
    /// Multiple header lines are treated as one comma-separated list.
    pub fn merge_headers(&self, headers: &HeaderMap) -> usize {
        let mut values = Vec::new();
        for value in headers.get_all(SERVER_TIMING) {
            match std::str::from_utf8(value.as_bytes()) {
                Ok(v) => values.push(v),
                Err(e) => {
                    tracing::debug!(error = %e, "Discarding non-UTF-8 Server-Timing header");
                    return 0;
                }
            }
        }
        if values.is_empty() {
            return 0;
        }
        self.merge_from(&values.join(","))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no entries were recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of every entry in order.
    pub fn snapshot(&self) -> Vec<TimingEntry> {
        self.lock().iter().map(EntryHandle::snapshot).collect()
    }

    /// Serialize the collection into a `Server-Timing` value.
    pub fn header_value(&self) -> String {
        format_header(&self.snapshot())
    }

    #[cfg(test)]
    fn position(&self, handle: &EntryHandle) -> Option<usize> {
        self.lock().iter().position(|h| h.ptr_eq(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::sync::Arc;

    fn names(collection: &TimingCollection) -> Vec<String> {
        collection.snapshot().into_iter().map(|e| e.name).collect()
    }

    #[test]
    fn test_append_order() {
        let collection = TimingCollection::new();
        collection.new_entry("a", "");
        collection.new_entry("b", "");
        assert_eq!(names(&collection), vec!["a", "b"]);
    }

    #[test]
    fn test_merge_splices_at_head() {
        let collection = TimingCollection::new();
        let a = collection.new_entry("a", "GET /");
        assert_eq!(collection.merge_from("x;dur=1, y;dur=2"), 2);
        assert_eq!(names(&collection), vec!["x", "y", "a"]);
        assert_eq!(collection.position(&a), Some(2));
    }

    #[test]
    fn test_malformed_merge_is_noop() {
        let collection = TimingCollection::new();
        collection.new_entry("a", "");
        assert_eq!(collection.merge_from(r#"x;desc="broken"#), 0);
        assert_eq!(names(&collection), vec!["a"]);
    }

    #[test]
    fn test_merge_headers_joins_lines() {
        let collection = TimingCollection::new();
        let mut headers = HeaderMap::new();
        headers.append(SERVER_TIMING, HeaderValue::from_static("x"));
        headers.append(SERVER_TIMING, HeaderValue::from_static("y;dur=3"));
        assert_eq!(collection.merge_headers(&headers), 2);
        assert_eq!(names(&collection), vec!["x", "y"]);
        assert_eq!(collection.merge_headers(&HeaderMap::new()), 0);
    }

    #[test]
    fn test_header_value_reflects_handle_writes() {
        let collection = TimingCollection::new();
        let handle = collection.new_entry("api", "GET /v1");
        handle.set_extra("code", "200");
        assert_eq!(collection.header_value(), r#"api;desc="GET /v1";code=200"#);
    }

    #[test]
    fn test_concurrent_appends_and_merges() {
        let collection = Arc::new(TimingCollection::new());
        let threads: Vec<_> = (0..16)
            .map(|i| {
                let collection = collection.clone();
                std::thread::spawn(move || {
                    for j in 0..25 {
                        collection.new_entry(format!("t{i}-{j}"), "");
                        if j % 5 == 0 {
                            collection.merge_from("n1,n2");
                        }
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        // 16 * 25 appends plus 16 * 5 merges of two metrics each.
        assert_eq!(collection.len(), 400 + 160);

        // Nested pairs are never split by a concurrent insert.
        let entries = names(&collection);
        for (i, name) in entries.iter().enumerate() {
            if name == "n1" {
                assert_eq!(entries[i + 1], "n2");
            }
        }
    }
}
