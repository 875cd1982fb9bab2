//! Open Library search API adapter.
//!
//! Queries `GET {base}/search.json?q=title:<title> AND author:<author>` and
//! reads the ISBN list of the first returned document.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{ErrorKind, Identifier, LookupOutcome, LookupQuery};
use super::{outcome_from_identifiers, parse_base_url, IdentifierPreference, LookupError, LookupService};

const DEFAULT_BASE_URL: &str = "https://openlibrary.org";

/// Open Library adapter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenLibraryConfig {
    /// Base URL (default: https://openlibrary.org).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Open Library lookup adapter.
#[derive(Debug, Clone)]
pub struct OpenLibraryService {
    base_url: String,
}

impl OpenLibraryService {
    pub fn new(config: &OpenLibraryConfig) -> Result<Self, LookupError> {
        let base_url = parse_base_url(config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;
        Ok(Self { base_url })
    }
}

impl LookupService for OpenLibraryService {
    fn name(&self) -> &'static str {
        "open_library"
    }

    fn build_request(&self, query: &LookupQuery) -> Result<Url, LookupError> {
        let q = format!("title:{} AND author:{}", query.title, query.author);
        let url = format!(
            "{}/search.json?q={}&fields=isbn",
            self.base_url,
            urlencoding::encode(&q)
        );
        Url::parse(&url).map_err(|e| LookupError::InvalidRequest(e.to_string()))
    }

    fn parse_response(&self, raw: &[u8], preference: IdentifierPreference) -> LookupOutcome {
        let response: OlSearchResponse = match serde_json::from_slice(raw) {
            Ok(r) => r,
            Err(e) => {
                debug!("Open Library response did not parse: {}", e);
                return LookupOutcome::Failed(ErrorKind::MalformedResponse);
            }
        };

        let Some(doc) = response.docs.into_iter().next() else {
            return LookupOutcome::NotFound;
        };

        // Open Library lists ISBNs untyped; infer the kind from the shape
        let identifiers: Vec<Identifier> = doc.isbn.iter().map(|i| Identifier::classify(i)).collect();

        outcome_from_identifiers(&identifiers, preference)
    }
}

// ============================================================================
// Open Library API Response Types (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct OlSearchResponse {
    #[serde(default)]
    docs: Vec<OlDoc>,
}

#[derive(Debug, Deserialize)]
struct OlDoc {
    #[serde(default)]
    isbn: Vec<String>,
}
