//! Task dispatcher: one lookup task per row, under the governor's limit.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::cancel::CancellationSignal;
use super::collector::Collector;
use super::config::{PipelineConfig, RetryConfig};
use super::types::Row;
use crate::governor::Governor;
use crate::lookup::{ErrorKind, LookupClient, LookupOutcome, LookupQuery};
use crate::metrics;
use crate::table::{RowSource, TableError};

/// Why the dispatcher stopped admitting rows.
#[derive(Debug)]
pub enum DispatchEnd {
    /// The source was exhausted.
    Exhausted,
    /// Cancellation was requested.
    Cancelled,
    /// The governor was closed underneath the dispatcher.
    Aborted,
    /// The source failed mid-stream.
    SourceFailed(TableError),
}

/// Summary of a dispatch pass.
#[derive(Debug)]
pub struct DispatchSummary {
    /// Rows admitted; each was handed to the collector exactly once.
    pub admitted: usize,
    /// Retry attempts issued.
    pub retries: u64,
    pub end: DispatchEnd,
}

/// Schedules lookups for a stream of rows.
pub struct Dispatcher {
    client: Arc<dyn LookupClient>,
    governor: Governor,
    /// Rows admitted past the collector's emission cursor.
    window: usize,
    retry: RetryConfig,
    deadline: Duration,
    title_column: usize,
    author_column: usize,
    retries: Arc<AtomicU64>,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn LookupClient>, governor: Governor, config: &PipelineConfig) -> Self {
        Self {
            client,
            governor,
            window: config.max_workers.max(1),
            retry: config.retry.clone(),
            deadline: config.request_timeout(),
            title_column: config.title_column,
            author_column: config.author_column,
            retries: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Admit rows from `source` until it is exhausted, fails, or `cancel`
    /// fires, then wait for every admitted row to reach the collector.
    ///
    /// A permit is acquired before a row is read, so the dispatcher never
    /// reads more than `max_workers` rows ahead of completed lookups. A row
    /// is also not admitted until it lies within `max_workers` rows of the
    /// collector's emission cursor, so a slow early row holds admission
    /// instead of letting finished rows pile up behind it.
    pub async fn run(
        &self,
        source: &mut dyn RowSource,
        collector: &Collector,
        cancel: &CancellationSignal,
    ) -> DispatchSummary {
        let mut tasks = JoinSet::new();
        let mut admitted = 0usize;

        let end = loop {
            if cancel.is_cancelled() {
                break DispatchEnd::Cancelled;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break DispatchEnd::Cancelled,
                _ = collector.wait_for_slot(admitted, self.window) => {}
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break DispatchEnd::Cancelled,
                permit = self.governor.acquire() => match permit {
                    Ok(p) => p,
                    Err(_) => break DispatchEnd::Aborted,
                },
            };

            let fields = match source.next_record() {
                Some(Ok(fields)) => fields,
                Some(Err(e)) => break DispatchEnd::SourceFailed(e),
                None => break DispatchEnd::Exhausted,
            };

            let row = Row::new(admitted, fields);
            admitted += 1;

            let Some(query) =
                LookupQuery::from_fields(row.fields(), self.title_column, self.author_column)
            else {
                warn!(index = row.index(), "Row is missing the title or author column");
                self.governor.release(permit);
                collector
                    .accept(row.index(), row, LookupOutcome::Failed(ErrorKind::Unexpected))
                    .await;
                continue;
            };

            let client = Arc::clone(&self.client);
            let governor = self.governor.clone();
            let collector = collector.clone();
            let retry = self.retry.clone();
            let deadline = self.deadline;
            let retries = Arc::clone(&self.retries);

            tasks.spawn(async move {
                let lookup = resolve_with_retry(&*client, &governor, &retry, &query, deadline, &retries);
                let outcome = match AssertUnwindSafe(lookup).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        error!(index = row.index(), "Lookup task panicked");
                        LookupOutcome::Failed(ErrorKind::Unexpected)
                    }
                };
                governor.release(permit);

                match &outcome {
                    LookupOutcome::Failed(kind) => {
                        warn!(index = row.index(), title = %query.title, %kind, "Lookup failed")
                    }
                    other => {
                        debug!(index = row.index(), title = %query.title, outcome = other.label(), "Lookup finished")
                    }
                }
                collector.accept(row.index(), row, outcome).await;
            });

            // Reap finished tasks so the set does not grow with the input
            while let Some(result) = tasks.try_join_next() {
                log_join_error(result);
            }
        };

        match &end {
            DispatchEnd::Cancelled => info!(admitted, "Cancellation requested, draining in-flight lookups"),
            DispatchEnd::Aborted => warn!(admitted, "Dispatch aborted, draining in-flight lookups"),
            DispatchEnd::SourceFailed(e) => error!(admitted, "Source failed: {}", e),
            DispatchEnd::Exhausted => debug!(admitted, "Source exhausted"),
        }

        while let Some(result) = tasks.join_next().await {
            log_join_error(result);
        }

        DispatchSummary {
            admitted,
            retries: self.retries.load(Ordering::SeqCst),
            end,
        }
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!("Lookup task did not complete: {}", e);
    }
}

/// Call the lookup client, retrying transport and rate-limit failures with
/// exponential backoff. The caller's permit is held throughout.
async fn resolve_with_retry(
    client: &dyn LookupClient,
    governor: &Governor,
    retry: &RetryConfig,
    query: &LookupQuery,
    deadline: Duration,
    retries: &AtomicU64,
) -> LookupOutcome {
    let mut attempt = 0u32;
    loop {
        let outcome = client.resolve(query, deadline).await;

        let kind = match &outcome {
            LookupOutcome::Failed(kind) if kind.is_retryable() && attempt < retry.max_retries => *kind,
            _ => return outcome,
        };

        attempt += 1;
        retries.fetch_add(1, Ordering::SeqCst);
        metrics::LOOKUP_RETRIES
            .with_label_values(&[client.name(), kind.as_str()])
            .inc();

        let delay = retry.delay_for(attempt);
        debug!(title = %query.title, %kind, attempt, ?delay, "Retrying lookup");
        tokio::time::sleep(delay).await;
        governor.pace().await;
    }
}
