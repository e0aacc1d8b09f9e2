//! The `Iteration<k>, key=value` entry format shared by the history logs.

use std::fmt::Write as _;

use ndarray::Array1;
use thiserror::Error;

const HEADER: &str = "Iteration";

/// One parsed history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub index: usize,

    /// Header scalars in file order.
    pub keys: Vec<(String, f64)>,

    pub values: Vec<f64>,
}

impl Entry {
    /// Returns the header scalar named `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.keys.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }
}

/// A malformed line in a history log.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct EntryError {
    pub line: usize,
    pub message: String,
}

impl EntryError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Formats a field as `[v0 v1 ...]`.
///
/// Values use Rust's shortest round-trip representation, so parsing them
/// back yields identical `f64`s.
#[must_use]
pub fn format_values(values: &Array1<f64>) -> String {
    let mut out = String::with_capacity(values.len() * 12 + 2);
    out.push('[');
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{v}");
    }
    out.push(']');
    out
}

/// Formats an entry header such as `Iteration3, rms_step=0.25`.
pub(crate) fn format_header(index: usize, keys: &[(&str, f64)]) -> String {
    let mut out = format!("{HEADER}{index}");
    for (key, value) in keys {
        let _ = write!(out, ", {key}={value}");
    }
    out
}

/// Parses every entry in a history log.
///
/// Field values may wrap over several lines. Brackets are ignored.
///
/// # Errors
///
/// Returns an error naming the first malformed line.
pub fn parse_entries(content: &str) -> Result<Vec<Entry>, EntryError> {
    let mut entries: Vec<Entry> = Vec::new();

    for (number, line) in content.lines().enumerate() {
        let number = number + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix(HEADER) {
            entries.push(parse_header(header, number)?);
            continue;
        }

        let Some(entry) = entries.last_mut() else {
            return Err(EntryError::new(number, "values before the first header"));
        };
        for token in line.split(|c: char| c.is_whitespace() || c == '[' || c == ']') {
            if token.is_empty() {
                continue;
            }
            let value = token
                .parse::<f64>()
                .map_err(|_| EntryError::new(number, format!("invalid value `{token}`")))?;
            entry.values.push(value);
        }
    }

    Ok(entries)
}

/// Parses a history log whose last write may have been cut short.
///
/// An append writes a header line and a value line in one go, so a crash
/// leaves either a partial final line or a header with no values. That
/// trailing entry is dropped and reported through the returned flag. Anything
/// malformed before it is still an error.
///
/// # Errors
///
/// Returns an error naming the first malformed line outside the torn tail.
pub fn parse_complete_entries(content: &str) -> Result<(Vec<Entry>, bool), EntryError> {
    let complete = if content.ends_with('\n') {
        content
    } else {
        content.rfind('\n').map_or("", |end| &content[..=end])
    };
    let mut torn = !content[complete.len()..].trim().is_empty();

    let mut entries = parse_entries(complete)?;
    if entries.last().is_some_and(|entry| entry.values.is_empty()) {
        entries.pop();
        torn = true;
    }
    Ok((entries, torn))
}

fn parse_header(header: &str, line: usize) -> Result<Entry, EntryError> {
    let mut parts = header.split(',');

    let index = parts
        .next()
        .map(str::trim)
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| EntryError::new(line, "missing iteration index"))?;

    let mut keys = Vec::new();
    for part in parts {
        let (key, value) = part.split_once('=').ok_or_else(|| {
            EntryError::new(line, format!("expected key=value, got `{}`", part.trim()))
        })?;
        let value = value
            .trim()
            .parse::<f64>()
            .map_err(|_| EntryError::new(line, format!("invalid value for `{}`", key.trim())))?;
        keys.push((key.trim().to_owned(), value));
    }

    Ok(Entry {
        index,
        keys,
        values: Vec::new(),
    })
}
