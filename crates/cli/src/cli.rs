//! Command-line arguments, configuration overrides and tracing setup.

use std::path::{Path, PathBuf};

use clap::Parser;
use isbnfill_core::{Config, IdentifierPreference, LookupServiceKind};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// isbnfill: add an ISBN column to a table of book titles and authors.
#[derive(Parser, Debug)]
#[command(
    name = "isbnfill",
    version,
    about = "Look up an ISBN for every title/author row of a CSV file.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Input CSV file (header row, then title/author records).
    pub input: PathBuf,

    /// Output CSV file (defaults to <input stem>_with_isbn.csv next to the input).
    pub output: Option<PathBuf>,

    /// Configuration file (TOML).
    #[arg(short, long, env = "ISBNFILL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Lookup service: google_books or open_library.
    #[arg(long)]
    pub service: Option<LookupServiceKind>,

    /// Maximum concurrent lookups.
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Retries for transport and rate-limit failures.
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Minimum spacing between requests in milliseconds.
    #[arg(long)]
    pub min_interval_ms: Option<u64>,

    /// Identifier preference: prefer_isbn13, prefer_isbn10, isbn13_only, first_listed.
    #[arg(long)]
    pub prefer: Option<IdentifierPreference>,

    /// Write Prometheus metrics in text format to this file after the run.
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Log output format.
#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

impl Cli {
    /// Output path given on the command line, or the default one.
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_output_path(&self.input))
    }

    /// Apply command-line overrides on top of file and environment settings.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(service) = self.service {
            config.lookup.service = service;
        }
        if let Some(max_workers) = self.max_workers {
            config.pipeline.max_workers = max_workers;
        }
        if let Some(timeout) = self.timeout_secs {
            config.pipeline.request_timeout_secs = timeout;
        }
        if let Some(retries) = self.max_retries {
            config.pipeline.retry.max_retries = retries;
        }
        if let Some(interval) = self.min_interval_ms {
            config.pipeline.min_request_interval_ms = interval;
        }
        if let Some(prefer) = self.prefer {
            config.pipeline.identifier_preference = prefer;
        }
    }
}

/// `<dir>/<stem>_with_isbn.csv` for an input at `<dir>/<stem>.<ext>`.
pub(crate) fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}_with_isbn.csv", stem))
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match cli.verbose {
        0 => "isbnfill=info,isbnfill_core=info",
        1 => "isbnfill=debug,isbnfill_core=debug",
        _ => "isbnfill=trace,isbnfill_core=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("data/books.csv")),
            PathBuf::from("data/books_with_isbn.csv")
        );
        assert_eq!(
            default_output_path(Path::new("books")),
            PathBuf::from("books_with_isbn.csv")
        );
    }

    #[test]
    fn test_parse_minimal_args() {
        let cli = Cli::try_parse_from(["isbnfill", "books.csv"]).unwrap();
        assert_eq!(cli.input, PathBuf::from("books.csv"));
        assert_eq!(cli.output_path(), PathBuf::from("books_with_isbn.csv"));
        assert_eq!(cli.log_format, LogFormat::Text);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let cli = Cli::try_parse_from([
            "isbnfill",
            "in.csv",
            "out.csv",
            "--service",
            "open_library",
            "--max-workers",
            "3",
            "--timeout-secs",
            "9",
            "--max-retries",
            "0",
            "--min-interval-ms",
            "200",
            "--prefer",
            "first_listed",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.output_path(), PathBuf::from("out.csv"));
        assert_eq!(cli.verbose, 2);

        let mut config = Config::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.lookup.service, LookupServiceKind::OpenLibrary);
        assert_eq!(config.pipeline.max_workers, 3);
        assert_eq!(config.pipeline.request_timeout_secs, 9);
        assert_eq!(config.pipeline.retry.max_retries, 0);
        assert_eq!(config.pipeline.min_request_interval_ms, 200);
        assert_eq!(
            config.pipeline.identifier_preference,
            IdentifierPreference::FirstListed
        );
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let cli = Cli::try_parse_from(["isbnfill", "in.csv"]).unwrap();
        let mut config = Config::default();
        config.pipeline.max_workers = 42;
        cli.apply_overrides(&mut config);
        assert_eq!(config.pipeline.max_workers, 42);
        assert_eq!(config.lookup.service, LookupServiceKind::GoogleBooks);
    }

    #[test]
    fn test_unknown_preference_rejected() {
        let result = Cli::try_parse_from(["isbnfill", "in.csv", "--prefer", "newest"]);
        assert!(result.is_err());
    }
}
