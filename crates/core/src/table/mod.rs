//! Row sources and sinks.
//!
//! The pipeline reads records from a [`RowSource`] and writes enriched rows to
//! a [`RowSink`]. A delimited-text (CSV) implementation and in-memory
//! implementations are provided.

mod delimited;
mod memory;

pub use delimited::{CsvSink, CsvSource};
pub use memory::{MemorySink, MemorySource};

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::EnrichedRow;

/// Errors raised by sources and sinks.
#[derive(Debug, Error)]
pub enum TableError {
    /// The underlying file could not be opened or created.
    #[error("Failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be read.
    #[error("Failed to read record: {0}")]
    Read(String),

    /// A record could not be written.
    #[error("Failed to write record: {0}")]
    Write(String),
}

/// A lazily read sequence of records with a header.
pub trait RowSource: Send {
    /// Column names. Empty when the input has no header row.
    fn header(&mut self) -> Result<Vec<String>, TableError>;

    /// The next record, or `None` once the input is exhausted.
    fn next_record(&mut self) -> Option<Result<Vec<String>, TableError>>;
}

/// Destination for enriched rows.
pub trait RowSink: Send {
    fn write_header(&mut self, names: &[String]) -> Result<(), TableError>;

    fn write(&mut self, row: &EnrichedRow) -> Result<(), TableError>;

    /// Flush buffered output. Called once after the last row.
    fn finish(&mut self) -> Result<(), TableError> {
        Ok(())
    }
}
