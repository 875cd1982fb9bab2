//! Row, enriched row and run statistics types.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::lookup::{ErrorKind, LookupOutcome};

/// Value written in the identifier column when nothing was resolved.
pub const ISBN_NOT_FOUND: &str = "ISBN Not Found";

/// Name of the leading output column.
pub const ISBN_HEADER: &str = "ISBN";

/// One input record, identified by its 0-based position in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    index: usize,
    fields: Vec<String>,
}

impl Row {
    pub fn new(index: usize, fields: Vec<String>) -> Self {
        Self { index, fields }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

/// A row paired with the outcome of its lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedRow {
    pub row: Row,
    pub outcome: LookupOutcome,
}

impl EnrichedRow {
    pub fn new(row: Row, outcome: LookupOutcome) -> Self {
        Self { row, outcome }
    }

    pub fn index(&self) -> usize {
        self.row.index
    }

    /// The resolved identifier, or the not-found sentinel.
    pub fn identifier_column(&self) -> &str {
        self.outcome.identifier().unwrap_or(ISBN_NOT_FOUND)
    }

    /// The output record: identifier column, then the original fields.
    pub fn to_record(&self) -> Vec<String> {
        let mut record = Vec::with_capacity(self.row.fields.len() + 1);
        record.push(self.identifier_column().to_string());
        record.extend(self.row.fields.iter().cloned());
        record
    }
}

/// Counters describing one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    /// Rows admitted to the pipeline.
    pub rows_seen: usize,
    pub found: usize,
    pub not_found: usize,
    pub failed: usize,
    /// Failures broken down by kind, iterated in [`ErrorKind`] order.
    pub failures: BTreeMap<ErrorKind, usize>,
    /// Retry attempts issued across all rows.
    pub retries: u64,
    /// Highest number of lookups outstanding at once.
    pub peak_in_flight: usize,
    /// Largest number of completed rows held waiting for an earlier row.
    pub peak_buffered: usize,
    /// Whether the run stopped admitting rows before the input was exhausted.
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl Default for RunStats {
    fn default() -> Self {
        Self {
            rows_seen: 0,
            found: 0,
            not_found: 0,
            failed: 0,
            failures: BTreeMap::new(),
            retries: 0,
            peak_in_flight: 0,
            peak_buffered: 0,
            cancelled: false,
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
        }
    }
}

impl RunStats {
    /// Count one accepted outcome.
    pub(crate) fn record(&mut self, outcome: &LookupOutcome) {
        self.rows_seen += 1;
        match outcome {
            LookupOutcome::Found(_) => self.found += 1,
            LookupOutcome::NotFound => self.not_found += 1,
            LookupOutcome::Failed(kind) => {
                self.failed += 1;
                *self.failures.entry(*kind).or_insert(0) += 1;
            }
        }
    }

    /// Failures of the given kind.
    pub fn failed_with(&self, kind: ErrorKind) -> usize {
        self.failures.get(&kind).copied().unwrap_or(0)
    }

    /// One-line human readable summary.
    pub fn summary(&self) -> String {
        format!(
            "{} rows: {} found, {} not found, {} failed in {:.2} seconds",
            self.rows_seen,
            self.found,
            self.not_found,
            self.failed,
            self.elapsed.as_secs_f64()
        )
    }
}
