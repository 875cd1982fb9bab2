//! Delimited-text (CSV) source and sink.
//!
//! Records may have varying lengths. Output uses CRLF line endings and
//! minimal quoting.

use std::fs::File;
use std::io;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};

use super::{RowSink, RowSource, TableError};
use crate::pipeline::EnrichedRow;

/// Reads records from CSV text; the first record is the header.
pub struct CsvSource<R = File> {
    reader: csv::Reader<R>,
    record: StringRecord,
}

impl CsvSource<File> {
    /// Open a CSV file for reading.
    pub fn open(path: &Path) -> Result<Self, TableError> {
        let file = File::open(path).map_err(|source| TableError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(file))
    }
}

impl<R: io::Read> CsvSource<R> {
    pub fn from_reader(reader: R) -> Self {
        let reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        Self {
            reader,
            record: StringRecord::new(),
        }
    }
}

impl<R: io::Read + Send> RowSource for CsvSource<R> {
    fn header(&mut self) -> Result<Vec<String>, TableError> {
        let headers = self
            .reader
            .headers()
            .map_err(|e| TableError::Read(e.to_string()))?;
        Ok(headers.iter().map(str::to_string).collect())
    }

    fn next_record(&mut self) -> Option<Result<Vec<String>, TableError>> {
        match self.reader.read_record(&mut self.record) {
            Ok(true) => Some(Ok(self.record.iter().map(str::to_string).collect())),
            Ok(false) => None,
            Err(e) => Some(Err(TableError::Read(e.to_string()))),
        }
    }
}

/// Writes enriched rows as CSV.
pub struct CsvSink<W: io::Write = File> {
    writer: csv::Writer<W>,
}

impl CsvSink<File> {
    /// Create (or truncate) a CSV file for writing.
    pub fn create(path: &Path) -> Result<Self, TableError> {
        let file = File::create(path).map_err(|source| TableError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_writer(file))
    }
}

impl<W: io::Write> CsvSink<W> {
    pub fn from_writer(writer: W) -> Self {
        let writer = WriterBuilder::new()
            .flexible(true)
            .terminator(Terminator::CRLF)
            .from_writer(writer);
        Self { writer }
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W, TableError> {
        self.writer
            .into_inner()
            .map_err(|e| TableError::Write(e.error().to_string()))
    }
}

impl<W: io::Write + Send> RowSink for CsvSink<W> {
    fn write_header(&mut self, names: &[String]) -> Result<(), TableError> {
        self.writer
            .write_record(names)
            .map_err(|e| TableError::Write(e.to_string()))
    }

    fn write(&mut self, row: &EnrichedRow) -> Result<(), TableError> {
        self.writer
            .write_record(row.to_record())
            .map_err(|e| TableError::Write(e.to_string()))
    }

    fn finish(&mut self) -> Result<(), TableError> {
        self.writer
            .flush()
            .map_err(|e| TableError::Write(e.to_string()))
    }
}
