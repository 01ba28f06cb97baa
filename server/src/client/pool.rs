//! Bounded-concurrency part upload workers

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures_util::future::join_all;
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::types::{ClientError, TransportError};

/// Retry schedule for a single part
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles each retry
    pub base_delay: Duration,
    /// Bound on one attempt, separate from the backoff delay
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(300),
            attempt_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (0-based): `base_delay * 2^attempt`
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Run one part upload with per-attempt timeout and exponential backoff.
///
/// Only transient failures and timeouts are retried. Cancellation interrupts
/// both an attempt in flight and a backoff sleep.
pub async fn upload_with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    part_number: u32,
    cancel: &CancellationToken,
    mut attempt_fn: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut attempt = 0;
    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            result = tokio::time::timeout(policy.attempt_timeout, attempt_fn()) => result,
        };

        let err = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => TransportError::Transient(format!(
                "attempt timed out after {:?}",
                policy.attempt_timeout
            )),
        };

        if !err.is_retryable() || attempt >= policy.max_retries {
            return Err(ClientError::PartUpload {
                part_number,
                attempts: attempt + 1,
                message: err.to_string(),
            });
        }

        let delay = policy.backoff(attempt);
        attempt += 1;
        counter!("histoflow_client_part_retries_total").increment(1);
        warn!(
            "Part {} attempt {} failed ({}), retrying in {:?}",
            part_number, attempt, err, delay
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// A fixed set of workers sharing one part-number cursor.
///
/// Claiming a number is a single atomic increment, so no part is claimed
/// twice and at most `concurrency` parts are in flight. The first failure
/// stops further claims; workers still running see the stop token.
pub struct PartUploadWorkerPool {
    concurrency: usize,
    cancel: CancellationToken,
}

impl PartUploadWorkerPool {
    pub fn new(concurrency: usize, cancel: CancellationToken) -> Self {
        Self {
            concurrency: concurrency.max(1),
            cancel,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Upload every part in `1..=total_parts` that `is_recorded` does not
    /// report as done.
    ///
    /// `work` receives the part number and a token that fires when the pool
    /// is stopping, either from the caller's abort signal or a sibling's
    /// failure.
    pub async fn run<R, F, Fut>(
        &self,
        total_parts: u32,
        is_recorded: R,
        work: F,
    ) -> Result<(), ClientError>
    where
        R: Fn(u32) -> bool + Sync,
        F: Fn(u32, CancellationToken) -> Fut + Sync,
        Fut: Future<Output = Result<(), ClientError>> + Send,
    {
        let cursor = AtomicU32::new(1);
        let stop = self.cancel.child_token();
        let first_error: Mutex<Option<ClientError>> = Mutex::new(None);

        let workers = (0..self.concurrency).map(|worker| {
            let cursor = &cursor;
            let stop = &stop;
            let first_error = &first_error;
            let is_recorded = &is_recorded;
            let work = &work;
            async move {
                loop {
                    if stop.is_cancelled() {
                        return;
                    }
                    let part_number = cursor.fetch_add(1, Ordering::SeqCst);
                    if part_number > total_parts {
                        return;
                    }
                    if is_recorded(part_number) {
                        continue;
                    }

                    if let Err(e) = work(part_number, stop.clone()).await {
                        if !matches!(e, ClientError::Cancelled) {
                            debug!("Worker {} stopping after part {} failed", worker, part_number);
                        }
                        if let Ok(mut slot) = first_error.lock()
                            && slot.is_none()
                        {
                            *slot = Some(e);
                        }
                        stop.cancel();
                        return;
                    }
                }
            }
        });
        join_all(workers).await;

        // The failing worker records its error before firing `stop`, so a
        // sibling's Cancelled never shadows the real failure.
        match first_error.into_inner().ok().flatten() {
            Some(e) => Err(e),
            None if cursor.load(Ordering::SeqCst) <= total_parts => Err(ClientError::Cancelled),
            None => Ok(()),
        }
    }
}
