//! In-memory row source and sink.

use std::collections::VecDeque;

use super::{RowSink, RowSource, TableError};
use crate::pipeline::EnrichedRow;

/// A source backed by a list of records.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    header: Vec<String>,
    records: VecDeque<Result<Vec<String>, String>>,
}

impl MemorySource {
    pub fn new<H, R, F>(header: H, records: R) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator<Item = F>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            records: records
                .into_iter()
                .map(|r| Ok(r.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }

    /// Append a read failure after the records added so far.
    pub fn then_error(mut self, message: &str) -> Self {
        self.records.push_back(Err(message.to_string()));
        self
    }

    /// Records not yet read.
    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

impl RowSource for MemorySource {
    fn header(&mut self) -> Result<Vec<String>, TableError> {
        Ok(self.header.clone())
    }

    fn next_record(&mut self) -> Option<Result<Vec<String>, TableError>> {
        self.records
            .pop_front()
            .map(|r| r.map_err(TableError::Read))
    }
}

/// A sink that keeps everything it is given.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    header: Option<Vec<String>>,
    records: Vec<Vec<String>>,
    fail_after: Option<usize>,
    finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose writes fail once `rows` rows have been written.
    pub fn failing_after(rows: usize) -> Self {
        Self {
            fail_after: Some(rows),
            ..Self::default()
        }
    }

    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    /// Rows written so far, each with the identifier column first.
    pub fn records(&self) -> &[Vec<String>] {
        &self.records
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl RowSink for MemorySink {
    fn write_header(&mut self, names: &[String]) -> Result<(), TableError> {
        self.header = Some(names.to_vec());
        Ok(())
    }

    fn write(&mut self, row: &EnrichedRow) -> Result<(), TableError> {
        if self.fail_after.is_some_and(|limit| self.records.len() >= limit) {
            return Err(TableError::Write("sink is full".to_string()));
        }
        self.records.push(row.to_record());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), TableError> {
        self.finished = true;
        Ok(())
    }
}
