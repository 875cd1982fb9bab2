//! Result collector: restores input order over concurrently completed rows.
//!
//! Workers call [`Collector::accept`] as they finish, in any order. Completed
//! rows wait in a reorder buffer keyed by input index until every lower index
//! has been emitted, so output order always equals input order. The buffer,
//! the emission cursor and the run statistics sit behind a single lock.
//!
//! The emission cursor is also published on a watch channel so the
//! dispatcher can hold admission to a window of rows past the cursor, which
//! keeps the reorder buffer bounded when an early row is slow.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, warn};

use super::types::{EnrichedRow, Row, RunStats};
use crate::lookup::LookupOutcome;
use crate::metrics;

struct CollectorState {
    next_index: usize,
    pending: BTreeMap<usize, EnrichedRow>,
    emitted: Vec<EnrichedRow>,
    output: Option<mpsc::Sender<EnrichedRow>>,
    progress: watch::Sender<usize>,
    stats: RunStats,
    finalized: bool,
}

impl CollectorState {
    /// Waits for room when the output channel is full.
    async fn emit(&mut self, row: EnrichedRow) {
        metrics::ROWS_EMITTED.inc();
        match &self.output {
            Some(tx) => {
                if tx.send(row).await.is_err() {
                    debug!("Collector output closed, dropping emitted row");
                }
            }
            None => self.emitted.push(row),
        }
    }

    async fn flush_ready(&mut self) {
        let start = self.next_index;
        while let Some(row) = self.pending.remove(&self.next_index) {
            self.next_index += 1;
            self.emit(row).await;
        }
        if self.next_index != start {
            self.progress.send_replace(self.next_index);
        }
    }
}

/// Gathers per-row outcomes and emits enriched rows in input order.
///
/// Cheap to clone; clones share the same buffer.
#[derive(Clone)]
pub struct Collector {
    inner: Arc<Mutex<CollectorState>>,
    progress: watch::Receiver<usize>,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector {
    /// A collector that keeps emitted rows until [`finalize`](Self::finalize).
    pub fn new() -> Self {
        Self::with_output(None)
    }

    /// A collector that streams emitted rows, in order, to the returned
    /// receiver. At most `capacity` emitted rows wait in the channel; once
    /// it is full, emission waits for the receiver. The channel closes when
    /// the collector is finalized.
    pub fn streaming(capacity: usize) -> (Self, mpsc::Receiver<EnrichedRow>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::with_output(Some(tx)), rx)
    }

    fn with_output(output: Option<mpsc::Sender<EnrichedRow>>) -> Self {
        let (progress, progress_rx) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(CollectorState {
                next_index: 0,
                pending: BTreeMap::new(),
                emitted: Vec::new(),
                output,
                progress,
                stats: RunStats::default(),
                finalized: false,
            })),
            progress: progress_rx,
        }
    }

    /// Record the outcome for the row at `index`.
    ///
    /// Returns `false`, and changes nothing, if the index was already
    /// accepted or the collector is finalized.
    pub async fn accept(&self, index: usize, row: Row, outcome: LookupOutcome) -> bool {
        let mut state = self.inner.lock().await;

        if state.finalized || index < state.next_index || state.pending.contains_key(&index) {
            warn!(index, "Ignoring duplicate or late outcome");
            return false;
        }

        state.stats.record(&outcome);
        state.pending.insert(index, EnrichedRow::new(row, outcome));
        let buffered = state.pending.len();
        if buffered > state.stats.peak_buffered {
            state.stats.peak_buffered = buffered;
        }
        state.flush_ready().await;
        true
    }

    /// Wait until the row at `index` falls within `window` rows of the
    /// emission cursor.
    ///
    /// Admitting only such rows bounds the reorder buffer to `window` rows.
    pub async fn wait_for_slot(&self, index: usize, window: usize) {
        let mut progress = self.progress.clone();
        // The sender lives in the shared state, which this collector keeps alive
        let _ = progress
            .wait_for(|next| index < next.saturating_add(window))
            .await;
    }

    /// Index of the next row to be emitted.
    pub async fn next_index(&self) -> usize {
        self.inner.lock().await.next_index
    }

    /// Completed rows waiting for an earlier index.
    pub async fn buffered(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    /// Finish collecting.
    ///
    /// Rows still buffered behind a missing index are emitted in index order
    /// rather than dropped. Returns the rows kept by a non-streaming
    /// collector (empty when streaming) and the final statistics. Closes the
    /// streaming channel.
    pub async fn finalize(&self) -> (Vec<EnrichedRow>, RunStats) {
        let mut state = self.inner.lock().await;

        if !state.pending.is_empty() {
            warn!(
                next_index = state.next_index,
                buffered = state.pending.len(),
                "Finalizing with gaps in the input order"
            );
            let pending = std::mem::take(&mut state.pending);
            for (index, row) in pending {
                state.next_index = index + 1;
                state.emit(row).await;
            }
            let next = state.next_index;
            state.progress.send_replace(next);
        }

        state.finalized = true;
        state.output = None;
        let rows = std::mem::take(&mut state.emitted);
        (rows, state.stats.clone())
    }
}
