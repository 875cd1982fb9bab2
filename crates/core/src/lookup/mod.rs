//! ISBN lookup against external bibliographic services.
//!
//! The [`LookupClient`] trait is what the pipeline consumes: one call, one
//! outcome, never an error. [`HttpLookupClient`] implements it on top of a
//! [`LookupService`] adapter, which hides a specific API's query syntax and
//! response schema. Google Books and Open Library adapters are provided and
//! are interchangeable.

mod client;
mod config;
mod google_books;
mod open_library;
mod preference;
mod types;

pub use client::HttpLookupClient;
pub use config::{LookupConfig, LookupServiceKind};
pub use google_books::{GoogleBooksConfig, GoogleBooksService};
pub use open_library::{OpenLibraryConfig, OpenLibraryService};
pub use preference::IdentifierPreference;
pub use types::*;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use thiserror::Error;

/// Errors raised while constructing lookup clients and requests.
///
/// Per-query failures are never errors; they are reported as
/// [`LookupOutcome::Failed`].
#[derive(Debug, Error)]
pub enum LookupError {
    /// The configured base URL is not a valid URL.
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),

    /// A request URL could not be built for a query.
    #[error("Failed to build request: {0}")]
    InvalidRequest(String),
}

/// Resolves a title/author query to an identifier.
#[async_trait]
pub trait LookupClient: Send + Sync {
    /// Name of the backing service, for logs and metrics.
    fn name(&self) -> &str;

    /// Perform one lookup, finishing within `deadline`.
    ///
    /// Every failure path resolves to [`LookupOutcome::Failed`]. No retries
    /// happen here.
    async fn resolve(&self, query: &LookupQuery, deadline: Duration) -> LookupOutcome;
}

/// Adapter for one external bibliographic API.
pub trait LookupService: Send + Sync {
    /// Stable service name.
    fn name(&self) -> &'static str;

    /// Build the request URL for a query.
    fn build_request(&self, query: &LookupQuery) -> Result<Url, LookupError>;

    /// Turn a raw response body into an outcome.
    ///
    /// Undecodable bodies yield `Failed(MalformedResponse)`; a response with
    /// no match, or a match without a usable identifier, yields `NotFound`.
    fn parse_response(&self, raw: &[u8], preference: IdentifierPreference) -> LookupOutcome;
}

/// Pick an identifier from a parsed candidate list.
pub(crate) fn outcome_from_identifiers(
    identifiers: &[Identifier],
    preference: IdentifierPreference,
) -> LookupOutcome {
    match preference.select(identifiers) {
        Some(id) => LookupOutcome::Found(id.value.clone()),
        None => LookupOutcome::NotFound,
    }
}

/// Parse and validate a configured base URL, dropping any trailing slash.
pub(crate) fn parse_base_url(raw: &str) -> Result<String, LookupError> {
    let trimmed = raw.trim_end_matches('/');
    Url::parse(trimmed).map_err(|e| LookupError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_identifiers() {
        let ids = vec![
            Identifier::new(IdentifierKind::Isbn10, "0441172717"),
            Identifier::new(IdentifierKind::Isbn13, "9780441172719"),
        ];
        assert_eq!(
            outcome_from_identifiers(&ids, IdentifierPreference::PreferIsbn13),
            LookupOutcome::Found("9780441172719".to_string())
        );
        assert_eq!(
            outcome_from_identifiers(&[], IdentifierPreference::PreferIsbn13),
            LookupOutcome::NotFound
        );
    }

    #[test]
    fn test_parse_base_url() {
        assert_eq!(
            parse_base_url("https://openlibrary.org/").unwrap(),
            "https://openlibrary.org"
        );
        let err = parse_base_url("not a url").unwrap_err();
        assert!(matches!(err, LookupError::InvalidBaseUrl { .. }));
    }
}
