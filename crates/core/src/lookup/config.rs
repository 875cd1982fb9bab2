//! Lookup service configuration.

use serde::{Deserialize, Serialize};

use super::google_books::GoogleBooksConfig;
use super::open_library::OpenLibraryConfig;

/// Which bibliographic service to query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupServiceKind {
    #[default]
    GoogleBooks,
    OpenLibrary,
}

impl LookupServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupServiceKind::GoogleBooks => "google_books",
            LookupServiceKind::OpenLibrary => "open_library",
        }
    }
}

impl std::str::FromStr for LookupServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "google_books" | "google" => Ok(LookupServiceKind::GoogleBooks),
            "open_library" | "openlibrary" => Ok(LookupServiceKind::OpenLibrary),
            other => Err(format!("unknown lookup service: {other}")),
        }
    }
}

/// Configuration for the lookup client and its adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Service to query.
    #[serde(default)]
    pub service: LookupServiceKind,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Google Books settings.
    #[serde(default)]
    pub google_books: GoogleBooksConfig,

    /// Open Library settings.
    #[serde(default)]
    pub open_library: OpenLibraryConfig,
}

fn default_user_agent() -> String {
    format!("isbnfill/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            service: LookupServiceKind::default(),
            user_agent: default_user_agent(),
            google_books: GoogleBooksConfig::default(),
            open_library: OpenLibraryConfig::default(),
        }
    }
}
