//! Bounded fan-out of independent API jobs.
//!
//! A batch spawns at most `limit` tasks at a time on a `JoinSet`; each task
//! additionally holds a [`JobScheduler`] permit while it runs, so a scheduler
//! shared between batches keeps the per-key cap across all of them. Results
//! are stored by submission index as tasks finish, in whatever order that is.
//!
//! Failure handling:
//!
//! - `FailurePolicy::CollectAll` (default): every job runs; each slot holds
//!   its own success or failure.
//! - `FailurePolicy::FailFast`: the first failure stops submission; in-flight
//!   jobs finish, never-started jobs are reported as `ClientError::Cancelled`.
//! - `ClientError::Unauthorized` from any job stops submission regardless of
//!   policy, and the batch returns `Err(Unauthorized)` once in-flight jobs
//!   have drained. Retrying with the same key cannot succeed.
//! - A panicking job is captured as `ClientError::JobPanicked` in its slot.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures_util::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::models::ApiKeyData;
use crate::dispatch::scheduler::JobScheduler;
use crate::error::ClientError;

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// What a batch does after a job fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    #[default]
    CollectAll,
    FailFast,
}

/// The result of one job, paired with the input it was submitted with.
#[derive(Debug)]
pub struct JobOutcome<I, T> {
    /// Position in the submitted batch.
    pub index: usize,
    pub input: I,
    pub result: Result<T, ClientError>,
}

impl<I, T> JobOutcome<I, T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// One outcome per submitted job, in submission order.
#[derive(Debug)]
pub struct BatchResults<I, T> {
    outcomes: Vec<JobOutcome<I, T>>,
}

impl<I, T> BatchResults<I, T> {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&JobOutcome<I, T>> {
        self.outcomes.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobOutcome<I, T>> {
        self.outcomes.iter()
    }

    /// Successful jobs as `(input, value)`.
    pub fn successes(&self) -> impl Iterator<Item = (&I, &T)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|value| (&o.input, value)))
    }

    /// Failed jobs as `(input, error)`.
    pub fn failures(&self) -> impl Iterator<Item = (&I, &ClientError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|err| (&o.input, err)))
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(JobOutcome::is_success)
    }

    pub fn into_outcomes(self) -> Vec<JobOutcome<I, T>> {
        self.outcomes
    }
}

impl<I, T> IntoIterator for BatchResults<I, T> {
    type Item = JobOutcome<I, T>;
    type IntoIter = std::vec::IntoIter<JobOutcome<I, T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JobDispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// Runs batches of independent jobs with bounded parallelism.
#[derive(Debug, Clone)]
pub struct JobDispatcher {
    limit: usize,
    policy: FailurePolicy,
    scheduler: JobScheduler,
    cancel: CancellationToken,
}

impl JobDispatcher {
    /// Creates a dispatcher with its own scheduler of `limit` slots (at least one).
    pub fn new(limit: usize) -> Self {
        let scheduler = JobScheduler::new(limit);
        Self {
            limit: scheduler.max_concurrent(),
            policy: FailurePolicy::default(),
            scheduler,
            cancel: CancellationToken::new(),
        }
    }

    /// Sizes the dispatcher from the key's `MaxConcurrentConnections`.
    pub fn from_key_info(info: &ApiKeyData) -> Self {
        Self::new(info.concurrency_limit())
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shares an existing scheduler, so the cap also covers other batches
    /// using it.
    pub fn with_scheduler(mut self, scheduler: JobScheduler) -> Self {
        self.limit = scheduler.max_concurrent();
        self.scheduler = scheduler;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    /// Token that stops submission when cancelled. Downloads started by the
    /// batch helpers also observe it between chunks.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs `op` once per input.
    ///
    /// `op` is called on the dispatcher's task in submission order and must
    /// return an owned future; the inputs themselves stay here and come back
    /// in the results.
    ///
    /// # Errors
    ///
    /// `ClientError::Unauthorized` if any job was rejected for its API key.
    /// Every other failure is reported in that job's slot.
    pub async fn run<I, T, F, Fut>(
        &self,
        inputs: Vec<I>,
        mut op: F,
    ) -> Result<BatchResults<I, T>, ClientError>
    where
        F: FnMut(&I) -> Fut,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
        T: Send + 'static,
    {
        let total = inputs.len();
        let started = Instant::now();
        let mut slots: Vec<Option<Result<T, ClientError>>> = (0..total).map(|_| None).collect();
        let mut join_set: JoinSet<(usize, Result<T, ClientError>)> = JoinSet::new();
        let mut next_index = 0usize;
        let mut stop_submitting = false;
        let mut unauthorized = false;
        let mut completed = 0usize;

        info!(
            "[DISPATCH] Starting batch of {} jobs (limit {}, {:?})",
            total, self.limit, self.policy
        );

        loop {
            // Spawn tasks up to the concurrency limit
            while !stop_submitting && join_set.len() < self.limit && next_index < total {
                if self.cancel.is_cancelled() {
                    info!("[DISPATCH] Cancelled, not submitting remaining jobs");
                    stop_submitting = true;
                    break;
                }

                let index = next_index;
                next_index += 1;

                let job = op(&inputs[index]);
                let scheduler = self.scheduler.clone();

                join_set.spawn(async move {
                    let result = match scheduler.acquire().await {
                        Ok(permit) => {
                            let result = AssertUnwindSafe(job)
                                .catch_unwind()
                                .await
                                .unwrap_or_else(|_| Err(ClientError::JobPanicked { index }));
                            drop(permit);
                            result
                        }
                        Err(e) => Err(e),
                    };
                    (index, result)
                });
            }

            // Nothing in flight: either everything was submitted or submission stopped
            if join_set.is_empty() {
                break;
            }

            match join_set.join_next().await {
                Some(Ok((index, result))) => {
                    completed += 1;
                    match &result {
                        Ok(_) => debug!(
                            "[DISPATCH] Job {} succeeded ({}/{})",
                            index, completed, total
                        ),
                        Err(e) => {
                            warn!("[DISPATCH] Job {} failed: {}", index, e);
                            if e.is_fatal() {
                                unauthorized = true;
                                stop_submitting = true;
                            } else if self.policy == FailurePolicy::FailFast {
                                stop_submitting = true;
                            }
                        }
                    }
                    slots[index] = Some(result);
                }
                Some(Err(join_error)) => {
                    // Tasks are never aborted and panics are caught inside them.
                    warn!("[DISPATCH] Task join error: {}", join_error);
                }
                None => break,
            }
        }

        let never_started = total - next_index;
        info!(
            "[DISPATCH] Batch finished: {} completed, {} not started, {}ms",
            completed,
            never_started,
            started.elapsed().as_millis()
        );

        if unauthorized {
            return Err(ClientError::Unauthorized);
        }

        let outcomes = inputs
            .into_iter()
            .zip(slots)
            .enumerate()
            .map(|(index, (input, slot))| JobOutcome {
                index,
                input,
                result: slot.unwrap_or(Err(ClientError::Cancelled)),
            })
            .collect();

        Ok(BatchResults { outcomes })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
