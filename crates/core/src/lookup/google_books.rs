//! Google Books volumes API adapter.
//!
//! Queries `GET {base}/volumes?q=intitle:<title> inauthor:<author>` and reads
//! the industry identifiers of the first returned volume.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{ErrorKind, Identifier, IdentifierKind, LookupOutcome, LookupQuery};
use super::{outcome_from_identifiers, parse_base_url, IdentifierPreference, LookupError, LookupService};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/books/v1";

/// Google Books adapter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoogleBooksConfig {
    /// Base URL (default: https://www.googleapis.com/books/v1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Optional API key; raises the anonymous daily quota.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Google Books lookup adapter.
#[derive(Debug, Clone)]
pub struct GoogleBooksService {
    base_url: String,
    api_key: Option<String>,
}

impl GoogleBooksService {
    pub fn new(config: &GoogleBooksConfig) -> Result<Self, LookupError> {
        let base_url = parse_base_url(config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;
        Ok(Self {
            base_url,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }
}

impl LookupService for GoogleBooksService {
    fn name(&self) -> &'static str {
        "google_books"
    }

    fn build_request(&self, query: &LookupQuery) -> Result<Url, LookupError> {
        let q = format!("intitle:{} inauthor:{}", query.title, query.author);
        let mut url = format!("{}/volumes?q={}", self.base_url, urlencoding::encode(&q));
        if let Some(key) = &self.api_key {
            url.push_str("&key=");
            url.push_str(&urlencoding::encode(key));
        }
        Url::parse(&url).map_err(|e| LookupError::InvalidRequest(e.to_string()))
    }

    fn parse_response(&self, raw: &[u8], preference: IdentifierPreference) -> LookupOutcome {
        let response: GbVolumesResponse = match serde_json::from_slice(raw) {
            Ok(r) => r,
            Err(e) => {
                debug!("Google Books response did not parse: {}", e);
                return LookupOutcome::Failed(ErrorKind::MalformedResponse);
            }
        };

        if response.total_items == 0 {
            return LookupOutcome::NotFound;
        }
        let Some(volume) = response.items.into_iter().next() else {
            return LookupOutcome::NotFound;
        };

        let identifiers: Vec<Identifier> = volume
            .volume_info
            .industry_identifiers
            .iter()
            .map(|id| Identifier::new(identifier_kind(&id.kind), &id.identifier))
            .collect();

        outcome_from_identifiers(&identifiers, preference)
    }
}

fn identifier_kind(declared: &str) -> IdentifierKind {
    match declared {
        "ISBN_13" => IdentifierKind::Isbn13,
        "ISBN_10" => IdentifierKind::Isbn10,
        _ => IdentifierKind::Other,
    }
}

// ============================================================================
// Google Books API Response Types (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct GbVolumesResponse {
    #[serde(rename = "totalItems", default)]
    total_items: u64,
    #[serde(default)]
    items: Vec<GbVolume>,
}

#[derive(Debug, Deserialize)]
struct GbVolume {
    #[serde(rename = "volumeInfo", default)]
    volume_info: GbVolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
struct GbVolumeInfo {
    #[serde(rename = "industryIdentifiers", default)]
    industry_identifiers: Vec<GbIndustryIdentifier>,
}

#[derive(Debug, Deserialize)]
struct GbIndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}
