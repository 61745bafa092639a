//! `Server-Timing` header codec.
//!
//! # Wire Format
//! ```text
//! Server-Timing: db;desc="SELECT users";dur=12.5;code=200, cache;dur=0.3
//!                └┬┘ └──────┬─────────┘ └──┬──┘ └──┬───┘
//!                name   description     millis   extra
//! ```
//!
//! # Design Decisions
//! - `desc` is always written quoted; other values only when they are not tokens
//! - `dur` is omitted for zero durations
//! - Parsing is all-or-nothing: one malformed metric rejects the whole value
//! - For repeated `desc`/`dur` parameters only the first occurrence counts

use axum::http::HeaderName;
use std::fmt::Write;
use std::time::Duration;
use thiserror::Error;

use crate::timing::entry::TimingEntry;

/// The `Server-Timing` header name.
pub const SERVER_TIMING: HeaderName = HeaderName::from_static("server-timing");

const PARAM_DESC: &str = "desc";
const PARAM_DUR: &str = "dur";

/// Errors produced while parsing a `Server-Timing` value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// A metric did not start with a token.
    #[error("expected metric name at byte {position}")]
    ExpectedName { position: usize },

    /// A `;` was not followed by a parameter name.
    #[error("expected parameter name at byte {position}")]
    ExpectedParam { position: usize },

    /// A `=` was not followed by a token or quoted string.
    #[error("expected parameter value at byte {position}")]
    ExpectedValue { position: usize },

    /// A quoted string ran to the end of the input.
    #[error("unterminated quoted string starting at byte {position}")]
    UnterminatedQuote { position: usize },

    /// Something other than `,` followed a metric.
    #[error("unexpected character {found:?} at byte {position}")]
    UnexpectedChar { found: char, position: usize },

    /// The `dur` parameter was not a finite, non-negative number.
    #[error("invalid duration {0:?}")]
    InvalidDuration(String),
}

/// Returns true for RFC 7230 `tchar`.
fn is_tchar(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

/// Returns true if `s` can be written without quoting.
pub fn is_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_tchar)
}

/// Write `s` as a token, replacing characters a token cannot hold with `_`.
fn write_token(out: &mut String, s: &str) {
    if s.is_empty() {
        out.push('_');
        return;
    }
    out.extend(s.chars().map(|c| if is_tchar(c) { c } else { '_' }));
}

/// Write `value` as a quoted string. Control characters other than HTAB
/// are not allowed in header values and are dropped.
fn write_quoted(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars().filter(|&c| c == '\t' || !c.is_control()) {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

fn write_param(out: &mut String, key: &str, value: &str) {
    out.push(';');
    write_token(out, key);
    out.push('=');
    if is_token(value) {
        out.push_str(value);
    } else {
        write_quoted(out, value);
    }
}

/// Format a duration as fractional milliseconds.
pub fn format_millis(duration: Duration) -> String {
    format!("{}", duration.as_nanos() as f64 / 1_000_000.0)
}

/// Serialize one entry into a single metric segment.
///
/// The output always parses back: names and keys that are not tokens are
/// rewritten, so one odd entry cannot invalidate the whole header.
pub fn format_entry(entry: &TimingEntry) -> String {
    let mut out = String::new();
    write_token(&mut out, &entry.name);

    if !entry.desc.is_empty() && !entry.extra.contains_key(PARAM_DESC) {
        out.push_str(";desc=");
        write_quoted(&mut out, &entry.desc);
    }
    if !entry.duration.is_zero() && !entry.extra.contains_key(PARAM_DUR) {
        // Writing into a String cannot fail.
        let _ = write!(out, ";dur={}", format_millis(entry.duration));
    }
    for (key, value) in &entry.extra {
        write_param(&mut out, key, value);
    }
    out
}

/// Serialize a list of entries into a full header value.
pub fn format_header<'a>(entries: impl IntoIterator<Item = &'a TimingEntry>) -> String {
    entries
        .into_iter()
        .map(format_entry)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse a full header value into its metrics, in order.
///
/// Empty and whitespace-only values yield no metrics.
pub fn parse_header(value: &str) -> Result<Vec<TimingEntry>, ParseError> {
    let mut parser = Parser { input: value, pos: 0 };
    let mut entries = Vec::new();

    loop {
        parser.skip_ows();
        match parser.peek() {
            None => break,
            Some(',') => {
                parser.pos += 1;
                continue;
            }
            Some(_) => {}
        }

        entries.push(parser.entry()?);

        parser.skip_ows();
        let position = parser.pos;
        match parser.bump() {
            None => break,
            Some(',') => {}
            Some(found) => return Err(ParseError::UnexpectedChar { found, position }),
        }
    }

    Ok(entries)
}

fn parse_duration(value: &str) -> Result<Duration, ParseError> {
    let millis: f64 = value
        .parse()
        .map_err(|_| ParseError::InvalidDuration(value.to_string()))?;
    if !millis.is_finite() || millis < 0.0 {
        return Err(ParseError::InvalidDuration(value.to_string()));
    }
    Duration::try_from_secs_f64(millis / 1000.0)
        .map_err(|_| ParseError::InvalidDuration(value.to_string()))
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ows(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.pos += 1;
        }
    }

    fn token(&mut self) -> Option<&'a str> {
        let start = self.pos;
        while self.peek().is_some_and(is_tchar) {
            self.pos += 1;
        }
        (self.pos > start).then(|| &self.input[start..self.pos])
    }

    fn quoted(&mut self) -> Result<String, ParseError> {
        let position = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(ParseError::UnterminatedQuote { position }),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some(c) => out.push(c),
                    None => return Err(ParseError::UnterminatedQuote { position }),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn value(&mut self) -> Result<String, ParseError> {
        if self.peek() == Some('"') {
            return self.quoted();
        }
        let position = self.pos;
        self.token()
            .map(str::to_string)
            .ok_or(ParseError::ExpectedValue { position })
    }

    fn entry(&mut self) -> Result<TimingEntry, ParseError> {
        let position = self.pos;
        let name = self.token().ok_or(ParseError::ExpectedName { position })?;
        let mut entry = TimingEntry::new(name, "");
        let (mut seen_desc, mut seen_dur) = (false, false);

        loop {
            self.skip_ows();
            if self.peek() != Some(';') {
                return Ok(entry);
            }
            self.pos += 1;
            self.skip_ows();

            let position = self.pos;
            let key = self.token().ok_or(ParseError::ExpectedParam { position })?;
            self.skip_ows();
            let value = if self.peek() == Some('=') {
                self.pos += 1;
                self.skip_ows();
                self.value()?
            } else {
                String::new()
            };

            if key.eq_ignore_ascii_case(PARAM_DESC) {
                if !seen_desc {
                    entry.desc = value;
                    seen_desc = true;
                }
            } else if key.eq_ignore_ascii_case(PARAM_DUR) {
                if !seen_dur {
                    entry.duration = parse_duration(&value)?;
                    seen_dur = true;
                }
            } else {
                entry.extra.entry(key.to_string()).or_insert(value);
            }
        }
    }
}
