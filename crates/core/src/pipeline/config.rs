//! Configuration for the enrichment pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::lookup::IdentifierPreference;

/// Configuration for a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum concurrent lookups.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Deadline for a single lookup request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Minimum spacing between two request issuances in milliseconds
    /// (0 = no pacing).
    #[serde(default)]
    pub min_request_interval_ms: u64,

    /// Retry configuration for transport and rate-limit failures.
    #[serde(default)]
    pub retry: RetryConfig,

    /// How to choose among several identifiers for one match.
    #[serde(default)]
    pub identifier_preference: IdentifierPreference,

    /// Column holding the title.
    #[serde(default)]
    pub title_column: usize,

    /// Column holding the author.
    #[serde(default = "default_author_column")]
    pub author_column: usize,
}

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_workers() -> usize {
    10
}

fn default_request_timeout() -> u64 {
    5
}

fn default_author_column() -> usize {
    1
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_delay() -> u64 {
    250
}

fn default_max_delay() -> u64 {
    4000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            request_timeout_secs: default_request_timeout(),
            min_request_interval_ms: 0,
            retry: RetryConfig::default(),
            identifier_preference: IdentifierPreference::default(),
            title_column: 0,
            author_column: default_author_column(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl PipelineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay_ms = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(delay_ms.min(self.max_delay_ms as f64) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_workers, 10);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.min_request_interval(), Duration::ZERO);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.title_column, 0);
        assert_eq!(config.author_column, 1);
        assert_eq!(
            config.identifier_preference,
            IdentifierPreference::PreferIsbn13
        );
    }

    #[test]
    fn test_deserialize_partial() {
        let toml = r#"
max_workers = 4
identifier_preference = "first_listed"

[retry]
max_retries = 0
"#;
        let config: PipelineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.identifier_preference, IdentifierPreference::FirstListed);
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.retry.initial_delay_ms, 250);
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_backoff_delays() {
        let retry = RetryConfig {
            max_retries: 5,
            initial_delay_ms: 100,
            max_delay_ms: 500,
            backoff_multiplier: 2.0,
        };
        assert_eq!(retry.delay_for(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for(2), Duration::from_millis(200));
        assert_eq!(retry.delay_for(3), Duration::from_millis(400));
        assert_eq!(retry.delay_for(4), Duration::from_millis(500));
        assert_eq!(retry.delay_for(10), Duration::from_millis(500));
    }
}
