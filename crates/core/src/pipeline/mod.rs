//! The concurrent row-enrichment pipeline.
//!
//! A [`Pipeline`] reads rows from a [`RowSource`](crate::table::RowSource),
//! resolves an identifier for each through a
//! [`LookupClient`](crate::lookup::LookupClient) with at most `max_workers`
//! lookups outstanding, and writes the enriched rows to a
//! [`RowSink`](crate::table::RowSink) in input order.

mod cancel;
mod collector;
mod config;
mod dispatcher;
mod orchestrator;
mod types;

pub use cancel::CancellationSignal;
pub use collector::Collector;
pub use config::{PipelineConfig, RetryConfig};
pub use dispatcher::{DispatchEnd, DispatchSummary, Dispatcher};
pub use orchestrator::{execute, Pipeline, PipelineError};
pub use types::{EnrichedRow, Row, RunStats, ISBN_HEADER, ISBN_NOT_FOUND};
