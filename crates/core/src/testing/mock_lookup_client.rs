//! Mock lookup client for testing.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::lookup::{ErrorKind, LookupClient, LookupOutcome, LookupQuery};

/// Mock implementation of the LookupClient trait.
///
/// Provides controllable behavior for testing:
/// - Scripted outcomes per title, consumed in order
/// - Fixed outcomes per title and a default outcome
/// - Fixed or per-title latency, honoring the caller's deadline
/// - Concurrency tracking (current and peak outstanding calls)
/// - Query and call-time recording for assertions
///
/// # Example
///
/// ```rust,ignore
/// use isbnfill_core::testing::MockLookupClient;
///
/// let client = MockLookupClient::new();
/// client.set_outcome("Dune", LookupOutcome::Found("9780441172719".into())).await;
///
/// let outcome = client.resolve(&LookupQuery::new("Dune", "Frank Herbert"), deadline).await;
/// assert_eq!(client.call_count().await, 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockLookupClient {
    name: String,
    /// Outcomes consumed one per call, by title.
    scripted: Arc<RwLock<HashMap<String, VecDeque<LookupOutcome>>>>,
    /// Outcomes returned on every call, by title.
    fixed: Arc<RwLock<HashMap<String, LookupOutcome>>>,
    /// Outcome for titles with nothing scripted or fixed.
    default_outcome: Arc<RwLock<LookupOutcome>>,
    /// Base latency of every call.
    latency: Arc<RwLock<Duration>>,
    /// Latency replacing the base latency for specific titles.
    title_latency: Arc<RwLock<HashMap<String, Duration>>>,
    /// Extra latency per title, in `[0, jitter)`, derived from the title.
    jitter: Arc<RwLock<Duration>>,
    /// Titles whose lookups panic.
    panics: Arc<RwLock<HashSet<String>>>,
    /// Recorded queries.
    calls: Arc<RwLock<Vec<LookupQuery>>>,
    /// When each recorded query was issued.
    call_times: Arc<RwLock<Vec<Instant>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl Default for MockLookupClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter even if the lookup panics.
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockLookupClient {
    /// Create a mock that answers `NotFound` to everything, instantly.
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            scripted: Arc::new(RwLock::new(HashMap::new())),
            fixed: Arc::new(RwLock::new(HashMap::new())),
            default_outcome: Arc::new(RwLock::new(LookupOutcome::NotFound)),
            latency: Arc::new(RwLock::new(Duration::ZERO)),
            title_latency: Arc::new(RwLock::new(HashMap::new())),
            jitter: Arc::new(RwLock::new(Duration::ZERO)),
            panics: Arc::new(RwLock::new(HashSet::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            call_times: Arc::new(RwLock::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a mock that returns `outcome` for every query.
    pub async fn always(outcome: LookupOutcome) -> Self {
        let client = Self::new();
        client.set_default_outcome(outcome).await;
        client
    }

    // =========================================================================
    // Outcome Configuration
    // =========================================================================

    pub async fn set_default_outcome(&self, outcome: LookupOutcome) {
        *self.default_outcome.write().await = outcome;
    }

    /// Return `outcome` every time `title` is looked up.
    pub async fn set_outcome(&self, title: &str, outcome: LookupOutcome) {
        self.fixed.write().await.insert(title.to_string(), outcome);
    }

    /// Return `outcomes` in order for successive lookups of `title`.
    pub async fn push_outcomes(&self, title: &str, outcomes: Vec<LookupOutcome>) {
        self.scripted
            .write()
            .await
            .entry(title.to_string())
            .or_default()
            .extend(outcomes);
    }

    /// Make lookups of `title` panic.
    pub async fn panic_on(&self, title: &str) {
        self.panics.write().await.insert(title.to_string());
    }

    // =========================================================================
    // Latency Configuration
    // =========================================================================

    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    /// Use `latency` instead of the base latency for `title`.
    pub async fn set_title_latency(&self, title: &str, latency: Duration) {
        self.title_latency
            .write()
            .await
            .insert(title.to_string(), latency);
    }

    /// Add a deterministic per-title delay in `[0, jitter)`.
    pub async fn set_jitter(&self, jitter: Duration) {
        *self.jitter.write().await = jitter;
    }

    // =========================================================================
    // Recording
    // =========================================================================

    pub async fn recorded_queries(&self) -> Vec<LookupQuery> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Issue time of every call, in call order.
    pub async fn call_times(&self) -> Vec<Instant> {
        self.call_times.read().await.clone()
    }

    /// Calls currently outstanding.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of calls outstanding at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn delay_for(&self, title: &str) -> Duration {
        let base = match self.title_latency.read().await.get(title) {
            Some(latency) => *latency,
            None => *self.latency.read().await,
        };
        let jitter = *self.jitter.read().await;
        if jitter.is_zero() {
            return base;
        }
        let mut hasher = DefaultHasher::new();
        title.hash(&mut hasher);
        let extra = hasher.finish() % jitter.as_micros().max(1) as u64;
        base + Duration::from_micros(extra)
    }

    async fn next_outcome(&self, title: &str) -> LookupOutcome {
        if let Some(outcome) = self
            .scripted
            .write()
            .await
            .get_mut(title)
            .and_then(|queue| queue.pop_front())
        {
            return outcome;
        }
        if let Some(outcome) = self.fixed.read().await.get(title) {
            return outcome.clone();
        }
        self.default_outcome.read().await.clone()
    }
}

#[async_trait]
impl LookupClient for MockLookupClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve(&self, query: &LookupQuery, deadline: Duration) -> LookupOutcome {
        self.call_times.write().await.push(Instant::now());
        self.calls.write().await.push(query.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(Arc::clone(&self.in_flight));

        let delay = self.delay_for(&query.title).await;
        if delay > deadline {
            tokio::time::sleep(deadline).await;
            return LookupOutcome::Failed(ErrorKind::Timeout);
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.panics.read().await.contains(&query.title) {
            panic!("mock lookup panicked for '{}'", query.title);
        }

        self.next_outcome(&query.title).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEADLINE: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_default_outcome() {
        let client = MockLookupClient::new();
        let outcome = client
            .resolve(&LookupQuery::new("Anything", "Anyone"), DEADLINE)
            .await;
        assert_eq!(outcome, LookupOutcome::NotFound);
        assert_eq!(client.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_scripted_then_fixed() {
        let client = MockLookupClient::new();
        client
            .set_outcome("Dune", LookupOutcome::Found("9780441172719".to_string()))
            .await;
        client
            .push_outcomes("Dune", vec![LookupOutcome::Failed(ErrorKind::Transport)])
            .await;

        let query = LookupQuery::new("Dune", "Frank Herbert");
        assert_eq!(
            client.resolve(&query, DEADLINE).await,
            LookupOutcome::Failed(ErrorKind::Transport)
        );
        assert_eq!(
            client.resolve(&query, DEADLINE).await,
            LookupOutcome::Found("9780441172719".to_string())
        );
        assert_eq!(client.recorded_queries().await, vec![query.clone(), query]);
    }

    #[tokio::test]
    async fn test_latency_beyond_deadline_times_out() {
        let client = MockLookupClient::new();
        client.set_latency(Duration::from_millis(200)).await;
        let outcome = client
            .resolve(&LookupQuery::new("Slow", "Writer"), Duration::from_millis(20))
            .await;
        assert_eq!(outcome, LookupOutcome::Failed(ErrorKind::Timeout));
        assert_eq!(client.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_title_latency_overrides_base() {
        let client = MockLookupClient::new();
        client.set_latency(Duration::from_millis(200)).await;
        client
            .set_title_latency("Quick", Duration::ZERO)
            .await;

        let quick = tokio::time::timeout(
            Duration::from_millis(100),
            client.resolve(&LookupQuery::new("Quick", "Writer"), DEADLINE),
        )
        .await;
        assert_eq!(quick.unwrap(), LookupOutcome::NotFound);
        assert_eq!(client.call_times().await.len(), 1);
    }

    #[tokio::test]
    async fn test_tracks_peak_in_flight() {
        let client = MockLookupClient::new();
        client.set_latency(Duration::from_millis(30)).await;

        let mut handles = Vec::new();
        for i in 0..4 {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                client
                    .resolve(&LookupQuery::new(format!("Book {}", i), "A"), DEADLINE)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(client.peak_in_flight(), 4);
        assert_eq!(client.in_flight(), 0);
    }
}
