use serde::{Deserialize, Serialize};

use crate::lookup::{IdentifierPreference, LookupConfig, LookupServiceKind};
use crate::pipeline::{PipelineConfig, RetryConfig};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub lookup: SanitizedLookupConfig,
    pub pipeline: SanitizedPipelineConfig,
}

/// Sanitized lookup config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedLookupConfig {
    pub service: LookupServiceKind,
    pub user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub api_key_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedPipelineConfig {
    pub max_workers: usize,
    pub request_timeout_secs: u64,
    pub min_request_interval_ms: u64,
    pub retry: RetryConfig,
    pub identifier_preference: IdentifierPreference,
    pub title_column: usize,
    pub author_column: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let lookup = &config.lookup;
        let (base_url, api_key_configured) = match lookup.service {
            LookupServiceKind::GoogleBooks => (
                lookup.google_books.base_url.clone(),
                lookup
                    .google_books
                    .api_key
                    .as_ref()
                    .is_some_and(|k| !k.is_empty()),
            ),
            LookupServiceKind::OpenLibrary => (lookup.open_library.base_url.clone(), false),
        };

        let pipeline = &config.pipeline;
        Self {
            lookup: SanitizedLookupConfig {
                service: lookup.service,
                user_agent: lookup.user_agent.clone(),
                base_url,
                api_key_configured,
            },
            pipeline: SanitizedPipelineConfig {
                max_workers: pipeline.max_workers,
                request_timeout_secs: pipeline.request_timeout_secs,
                min_request_interval_ms: pipeline.min_request_interval_ms,
                retry: pipeline.retry.clone(),
                identifier_preference: pipeline.identifier_preference,
                title_column: pipeline.title_column,
                author_column: pipeline.author_column,
            },
        }
    }
}
