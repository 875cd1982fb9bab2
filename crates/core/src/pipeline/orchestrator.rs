//! Pipeline orchestrator: runs one enrichment pass from source to sink.
//!
//! The dispatcher and the sink writer run concurrently on the calling task.
//! Rows reach the writer through the collector's ordered stream, so the
//! output is written incrementally and in input order while lookups are
//! still outstanding. Both the reorder buffer and the stream to the writer
//! hold at most `max_workers` rows.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::cancel::CancellationSignal;
use super::collector::Collector;
use super::config::PipelineConfig;
use super::dispatcher::{DispatchEnd, Dispatcher};
use super::types::{EnrichedRow, RunStats, ISBN_HEADER};
use crate::governor::Governor;
use crate::lookup::LookupClient;
use crate::table::{CsvSink, CsvSource, RowSink, RowSource, TableError};

/// Run-level failures. Per-row failures never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source could not be opened or failed mid-stream.
    #[error("Source error: {0}")]
    Source(#[source] TableError),

    /// The sink rejected the header, a row, or the final flush.
    #[error("Sink error: {0}")]
    Sink(#[source] TableError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A configured enrichment pipeline.
///
/// Holds the configuration and the lookup client. Each call to
/// [`execute`](Self::execute) is an independent run with its own governor,
/// collector, cancellation signal and statistics.
pub struct Pipeline {
    config: PipelineConfig,
    client: Arc<dyn LookupClient>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, client: Arc<dyn LookupClient>) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Enrich every record of `source` and write the results to `sink`.
    pub async fn execute(
        &self,
        source: &mut dyn RowSource,
        sink: &mut dyn RowSink,
    ) -> Result<RunStats, PipelineError> {
        self.execute_with_cancel(source, sink, &CancellationSignal::new())
            .await
    }

    /// Like [`execute`](Self::execute), stopping admission once `cancel`
    /// fires. The signal only affects this run.
    pub async fn execute_with_cancel(
        &self,
        source: &mut dyn RowSource,
        sink: &mut dyn RowSink,
        cancel: &CancellationSignal,
    ) -> Result<RunStats, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id, service = self.client.name());
        self.execute_inner(source, sink, cancel)
            .instrument(span)
            .await
    }

    async fn execute_inner(
        &self,
        source: &mut dyn RowSource,
        sink: &mut dyn RowSink,
        cancel: &CancellationSignal,
    ) -> Result<RunStats, PipelineError> {
        let started_at = Utc::now();
        let clock = Instant::now();

        info!(
            max_workers = self.config.max_workers,
            timeout_secs = self.config.request_timeout_secs,
            max_retries = self.config.retry.max_retries,
            preference = %self.config.identifier_preference,
            "Starting enrichment run"
        );

        let header = source.header().map_err(PipelineError::Source)?;
        let mut output_header = Vec::with_capacity(header.len() + 1);
        output_header.push(ISBN_HEADER.to_string());
        output_header.extend(header);
        sink.write_header(&output_header)
            .map_err(PipelineError::Sink)?;

        let governor = Governor::new(self.config.max_workers, self.config.min_request_interval());
        let (collector, rows) = Collector::streaming(self.config.max_workers);
        let dispatcher = Dispatcher::new(Arc::clone(&self.client), governor.clone(), &self.config);

        let dispatch = async {
            let summary = dispatcher.run(source, &collector, cancel).await;
            let (_, stats) = collector.finalize().await;
            (summary, stats)
        };
        let write = write_rows(rows, sink, &governor);

        let ((summary, mut stats), written) = tokio::join!(dispatch, write);

        stats.retries = summary.retries;
        stats.peak_in_flight = governor.peak_in_flight();
        stats.started_at = started_at;

        let write_result = written.and_then(|count| {
            if count != summary.admitted {
                return Err(PipelineError::Internal(format!(
                    "{} rows admitted but {} written",
                    summary.admitted, count
                )));
            }
            sink.finish().map_err(PipelineError::Sink)
        });
        stats.elapsed = clock.elapsed();

        match summary.end {
            DispatchEnd::SourceFailed(e) => {
                error!(admitted = summary.admitted, "Run stopped by a source failure");
                return Err(PipelineError::Source(e));
            }
            DispatchEnd::Cancelled => {
                stats.cancelled = true;
                warn!(admitted = summary.admitted, "Run cancelled before the input was exhausted");
            }
            DispatchEnd::Aborted | DispatchEnd::Exhausted => {}
        }

        write_result?;

        info!(
            rows = stats.rows_seen,
            found = stats.found,
            not_found = stats.not_found,
            failed = stats.failed,
            retries = stats.retries,
            peak_in_flight = stats.peak_in_flight,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Run complete: {}",
            stats.summary()
        );
        Ok(stats)
    }

    /// Enrich a CSV file into another CSV file.
    pub async fn enrich_csv(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancellationSignal,
    ) -> Result<RunStats, PipelineError> {
        let mut source = CsvSource::open(input).map_err(PipelineError::Source)?;
        let mut sink = CsvSink::create(output).map_err(PipelineError::Sink)?;
        self.execute_with_cancel(&mut source, &mut sink, cancel)
            .await
    }
}

/// Write rows as the collector emits them.
///
/// On the first sink failure the governor is closed so no further rows are
/// admitted; the stream is still drained so in-flight lookups can finish.
async fn write_rows(
    mut rows: mpsc::Receiver<EnrichedRow>,
    sink: &mut dyn RowSink,
    governor: &Governor,
) -> Result<usize, PipelineError> {
    let mut written = 0usize;
    let mut failure = None;

    while let Some(row) = rows.recv().await {
        if failure.is_some() {
            continue;
        }
        match sink.write(&row) {
            Ok(()) => written += 1,
            Err(e) => {
                error!(index = row.index(), "Sink write failed, aborting run: {}", e);
                governor.close();
                failure = Some(e);
            }
        }
    }

    match failure {
        Some(e) => Err(PipelineError::Sink(e)),
        None => Ok(written),
    }
}

/// Run one enrichment pass with a fresh [`Pipeline`].
pub async fn execute(
    source: &mut dyn RowSource,
    sink: &mut dyn RowSink,
    config: PipelineConfig,
    client: Arc<dyn LookupClient>,
) -> Result<RunStats, PipelineError> {
    Pipeline::new(config, client).execute(source, sink).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{ErrorKind, LookupOutcome};
    use crate::table::{MemorySink, MemorySource};
    use crate::testing::{fixtures, MockLookupClient};

    fn config(max_workers: usize) -> PipelineConfig {
        PipelineConfig {
            max_workers,
            ..PipelineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_execute_writes_header_and_rows() {
        let client = MockLookupClient::new();
        client
            .set_outcome("Dune", LookupOutcome::Found("9780441172719".to_string()))
            .await;

        let mut sink = MemorySink::new();
        let stats = execute(
            &mut fixtures::dune_and_it(),
            &mut sink,
            config(2),
            Arc::new(client),
        )
        .await
        .unwrap();

        assert_eq!(sink.header().unwrap(), ["ISBN", "Title", "Author"]);
        assert_eq!(
            sink.records(),
            [
                vec!["9780441172719", "Dune", "Frank Herbert"],
                vec!["ISBN Not Found", "It", "Stephen King"],
            ]
        );
        assert!(sink.is_finished());
        assert_eq!(stats.rows_seen, 2);
        assert_eq!(stats.found, 1);
        assert_eq!(stats.not_found, 1);
        assert!(!stats.cancelled);
    }

    #[tokio::test]
    async fn test_empty_input_writes_only_header() {
        let mut source = MemorySource::new(Vec::<String>::new(), Vec::<Vec<String>>::new());
        let mut sink = MemorySink::new();
        let stats = execute(
            &mut source,
            &mut sink,
            config(4),
            Arc::new(MockLookupClient::new()),
        )
        .await
        .unwrap();

        assert_eq!(sink.header().unwrap(), ["ISBN"]);
        assert!(sink.records().is_empty());
        assert_eq!(stats.rows_seen, 0);
    }

    #[tokio::test]
    async fn test_sink_failure_is_run_error() {
        let client = MockLookupClient::new();
        client.set_latency(std::time::Duration::from_millis(5)).await;
        let mut sink = MemorySink::failing_after(3);
        let result = execute(
            &mut fixtures::books(50),
            &mut sink,
            config(2),
            Arc::new(client.clone()),
        )
        .await;

        assert!(matches!(result, Err(PipelineError::Sink(_))));
        assert_eq!(sink.records().len(), 3);
        assert!(client.call_count().await < 50);
    }

    #[tokio::test]
    async fn test_source_failure_is_run_error() {
        let mut source = MemorySource::new(["Title", "Author"], vec![vec!["Dune", "Frank Herbert"]])
            .then_error("unterminated quote");
        let mut sink = MemorySink::new();
        let result = execute(
            &mut source,
            &mut sink,
            config(2),
            Arc::new(MockLookupClient::new()),
        )
        .await;

        assert!(matches!(result, Err(PipelineError::Source(_))));
        // The admitted row was still written in order
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test]
    async fn test_stats_include_retries_and_peak() {
        let client = MockLookupClient::new();
        client
            .push_outcomes("Book 0", vec![LookupOutcome::Failed(ErrorKind::Transport)])
            .await;
        client.set_latency(std::time::Duration::from_millis(10)).await;

        let mut cfg = config(3);
        cfg.retry.initial_delay_ms = 1;
        let mut sink = MemorySink::new();
        let stats = execute(&mut fixtures::books(9), &mut sink, cfg, Arc::new(client))
            .await
            .unwrap();

        assert_eq!(stats.retries, 1);
        assert!(stats.peak_in_flight >= 1 && stats.peak_in_flight <= 3);
        assert_eq!(stats.rows_seen, 9);
    }

    #[tokio::test]
    async fn test_cancelled_run_does_not_affect_next_run() {
        let client = MockLookupClient::new();
        let pipeline = Pipeline::new(config(2), Arc::new(client.clone()));

        let cancel = CancellationSignal::new();
        cancel.cancel();
        let mut first = MemorySink::new();
        let stats = pipeline
            .execute_with_cancel(&mut fixtures::books(3), &mut first, &cancel)
            .await
            .unwrap();
        assert!(stats.cancelled);
        assert_eq!(stats.rows_seen, 0);
        assert!(first.records().is_empty());

        let mut second = MemorySink::new();
        let stats = pipeline
            .execute(&mut fixtures::books(5), &mut second)
            .await
            .unwrap();
        assert!(!stats.cancelled);
        assert_eq!(stats.rows_seen, 5);
        assert_eq!(second.records().len(), 5);
        assert_eq!(client.call_count().await, 5);
    }
}
