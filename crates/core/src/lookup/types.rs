//! Types shared by the lookup client and the service adapters.

use std::fmt;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

static ISBN13_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{13}$").unwrap());
static ISBN10_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{9}[\dXx]$").unwrap());

/// A title/author pair sent to a lookup service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupQuery {
    pub title: String,
    pub author: String,
}

impl LookupQuery {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
        }
    }

    /// Build a query from a record's title and author columns.
    ///
    /// Returns `None` when the record is too short to contain either column.
    pub fn from_fields(fields: &[String], title_column: usize, author_column: usize) -> Option<Self> {
        let title = fields.get(title_column)?;
        let author = fields.get(author_column)?;
        Some(Self::new(title.trim(), author.trim()))
    }
}

/// Classification of a failed lookup.
///
/// Ordered by declaration, which is the order failure breakdowns are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request did not complete before its deadline.
    Timeout,
    /// Connection, DNS, I/O or server-side (5xx) failure.
    Transport,
    /// The service signaled throttling (HTTP 429).
    RateLimited,
    /// The payload could not be decoded into the expected shape.
    MalformedResponse,
    /// Anything else.
    Unexpected,
}

impl ErrorKind {
    /// Whether a failure of this kind is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Transport | ErrorKind::RateLimited)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Transport => "transport",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single completed lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// The service returned a usable identifier.
    Found(String),
    /// The service answered but had no usable identifier for the query.
    NotFound,
    /// The lookup failed.
    Failed(ErrorKind),
}

impl LookupOutcome {
    /// The resolved identifier, if any.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            LookupOutcome::Found(id) => Some(id),
            _ => None,
        }
    }

    /// Short label used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            LookupOutcome::Found(_) => "found",
            LookupOutcome::NotFound => "not_found",
            LookupOutcome::Failed(_) => "failed",
        }
    }
}

/// The kind of a bibliographic identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Isbn13,
    Isbn10,
    Other,
}

/// An identifier returned by a lookup service, normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub kind: IdentifierKind,
    pub value: String,
}

impl Identifier {
    /// Create an identifier with a kind declared by the service.
    pub fn new(kind: IdentifierKind, value: &str) -> Self {
        Self {
            kind,
            value: normalize(value),
        }
    }

    /// Create an identifier, inferring its kind from its shape.
    pub fn classify(value: &str) -> Self {
        let value = normalize(value);
        let kind = if is_isbn13(&value) {
            IdentifierKind::Isbn13
        } else if is_isbn10(&value) {
            IdentifierKind::Isbn10
        } else {
            IdentifierKind::Other
        };
        Self { kind, value }
    }
}

fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

fn is_isbn13(value: &str) -> bool {
    ISBN13_PATTERN.is_match(value)
}

fn is_isbn10(value: &str) -> bool {
    ISBN10_PATTERN.is_match(value)
}
