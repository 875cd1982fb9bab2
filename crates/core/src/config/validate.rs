use super::{types::Config, ConfigError};
use crate::lookup::{GoogleBooksService, OpenLibraryService};

/// Validate configuration
/// Currently validates:
/// - At least one worker and a non-zero request timeout
/// - Backoff never shrinks and its bounds are ordered
/// - Title and author come from different columns
/// - Configured base URLs parse
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let pipeline = &config.pipeline;

    if pipeline.max_workers == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.max_workers must be at least 1".to_string(),
        ));
    }

    if pipeline.request_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.request_timeout_secs must be at least 1".to_string(),
        ));
    }

    if pipeline.retry.backoff_multiplier < 1.0 {
        return Err(ConfigError::ValidationError(format!(
            "pipeline.retry.backoff_multiplier must be >= 1.0 (got {})",
            pipeline.retry.backoff_multiplier
        )));
    }

    if pipeline.retry.initial_delay_ms > pipeline.retry.max_delay_ms {
        return Err(ConfigError::ValidationError(format!(
            "pipeline.retry.initial_delay_ms ({}) exceeds max_delay_ms ({})",
            pipeline.retry.initial_delay_ms, pipeline.retry.max_delay_ms
        )));
    }

    if pipeline.title_column == pipeline.author_column {
        return Err(ConfigError::ValidationError(format!(
            "pipeline.title_column and pipeline.author_column are both {}",
            pipeline.title_column
        )));
    }

    // Adapter constructors parse the base URLs
    GoogleBooksService::new(&config.lookup.google_books)
        .map_err(|e| ConfigError::ValidationError(format!("lookup.google_books: {}", e)))?;
    OpenLibraryService::new(&config.lookup.open_library)
        .map_err(|e| ConfigError::ValidationError(format!("lookup.open_library: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invalid(config: &Config) {
        let result = validate_config(config);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_workers_fails() {
        let mut config = Config::default();
        config.pipeline.max_workers = 0;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let mut config = Config::default();
        config.pipeline.request_timeout_secs = 0;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_shrinking_backoff_fails() {
        let mut config = Config::default();
        config.pipeline.retry.backoff_multiplier = 0.5;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_inverted_delays_fail() {
        let mut config = Config::default();
        config.pipeline.retry.initial_delay_ms = 5000;
        config.pipeline.retry.max_delay_ms = 1000;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_same_columns_fail() {
        let mut config = Config::default();
        config.pipeline.author_column = 0;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_bad_base_url_fails() {
        let mut config = Config::default();
        config.lookup.open_library.base_url = Some("not a url".to_string());
        assert_invalid(&config);
    }
}
