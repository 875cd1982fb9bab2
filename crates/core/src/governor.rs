//! Concurrency and pacing governor for outbound lookups.
//!
//! Caps the number of outstanding lookups with a fair (FIFO) semaphore and
//! optionally enforces a minimum spacing between request issuances, since a
//! worker cap alone does not bound requests per second when lookups are fast.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Errors returned by [`Governor::acquire`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GovernorError {
    /// The governor was closed; no more permits will be granted.
    #[error("Governor is closed")]
    Closed,
}

struct GovernorInner {
    semaphore: Arc<Semaphore>,
    max_permits: usize,
    min_interval: Duration,
    last_issue: Mutex<Option<Instant>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Bounds concurrent lookups and paces their issuance.
///
/// Cheap to clone; clones share the same permit pool.
#[derive(Clone)]
pub struct Governor {
    inner: Arc<GovernorInner>,
}

/// One unit of lookup capacity. Returned to the pool when dropped.
pub struct Permit {
    _permit: OwnedSemaphorePermit,
    inner: Arc<GovernorInner>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for Permit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Permit").finish_non_exhaustive()
    }
}

impl Governor {
    /// Create a governor allowing `max_permits` outstanding lookups and at
    /// least `min_interval` between two issuances (zero disables pacing).
    ///
    /// `max_permits` is clamped to at least one.
    pub fn new(max_permits: usize, min_interval: Duration) -> Self {
        let max_permits = max_permits.max(1);
        Self {
            inner: Arc::new(GovernorInner {
                semaphore: Arc::new(Semaphore::new(max_permits)),
                max_permits,
                min_interval,
                last_issue: Mutex::new(None),
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Wait for a free slot, then for the pacing interval.
    ///
    /// Waiters are served in the order they called `acquire`.
    pub async fn acquire(&self) -> Result<Permit, GovernorError> {
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| GovernorError::Closed)?;

        let now_in_flight = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner
            .peak_in_flight
            .fetch_max(now_in_flight, Ordering::SeqCst);

        let permit = Permit {
            _permit: permit,
            inner: Arc::clone(&self.inner),
        };

        self.pace().await;
        Ok(permit)
    }

    /// Return a permit to the pool.
    pub fn release(&self, permit: Permit) {
        drop(permit);
    }

    /// Wait until the minimum issuance spacing has elapsed.
    ///
    /// Called by `acquire`, and directly before a retry issued under an
    /// already-held permit.
    pub async fn pace(&self) {
        if self.inner.min_interval.is_zero() {
            return;
        }

        let mut last = self.inner.last_issue.lock().await;
        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.inner.min_interval {
                let wait_time = self.inner.min_interval - elapsed;
                debug!("Governor pacing: waiting {:?}", wait_time);
                sleep(wait_time).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Stop granting permits. Pending and future `acquire` calls fail.
    pub fn close(&self) {
        self.inner.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.semaphore.is_closed()
    }

    pub fn max_permits(&self) -> usize {
        self.inner.max_permits
    }

    /// Permits currently held.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of permits held at once since creation.
    pub fn peak_in_flight(&self) -> usize {
        self.inner.peak_in_flight.load(Ordering::SeqCst)
    }
}
