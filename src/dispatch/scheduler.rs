//! Permit scheduler for concurrent API jobs.
//!
//! The service caps simultaneous connections per API key, so every job holds a
//! permit while it talks to the service. A scheduler can be shared by several
//! dispatch batches that use the same key; the cap then holds across them.
//!
//! # Usage
//!
//! ```ignore
//! let scheduler = JobScheduler::new(key_info.concurrency_limit());
//!
//! // Waits if all slots are taken
//! let permit = scheduler.acquire().await?;
//!
//! // Call the API while holding the permit...
//!
//! // Slot is released when the permit is dropped
//! drop(permit);
//! ```

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::ClientError;

// ─────────────────────────────────────────────────────────────────────────────
// JobScheduler
// ─────────────────────────────────────────────────────────────────────────────

/// Limits the number of jobs talking to the service at once.
#[derive(Debug, Clone)]
pub struct JobScheduler {
    sem: Arc<Semaphore>,
    max: usize,
}

impl JobScheduler {
    /// Creates a scheduler with `max_concurrent` slots (at least one).
    pub fn new(max_concurrent: usize) -> Self {
        let max = max_concurrent.max(1);
        Self {
            sem: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    /// Acquires a slot, waiting if all are in use.
    ///
    /// # Errors
    ///
    /// `ClientError::Cancelled` once the scheduler has been closed.
    pub async fn acquire(&self) -> Result<JobPermit, ClientError> {
        let permit = self
            .sem
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ClientError::Cancelled)?;

        Ok(self.wrap(permit))
    }

    /// Acquires a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<JobPermit> {
        self.sem
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| self.wrap(permit))
    }

    /// Rejects all waiting and future `acquire` calls. Held permits stay valid.
    pub fn close(&self) {
        self.sem.close();
    }

    pub fn is_closed(&self) -> bool {
        self.sem.is_closed()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max
    }

    /// Number of slots currently held.
    pub fn active_jobs(&self) -> usize {
        self.max - self.sem.available_permits()
    }

    pub fn available_slots(&self) -> usize {
        self.sem.available_permits()
    }

    fn wrap(&self, permit: OwnedSemaphorePermit) -> JobPermit {
        JobPermit {
            _permit: permit,
            max: self.max,
            sem: self.sem.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JobPermit
// ─────────────────────────────────────────────────────────────────────────────

/// A held slot. Released on drop.
#[derive(Debug)]
pub struct JobPermit {
    _permit: OwnedSemaphorePermit,
    max: usize,
    sem: Arc<Semaphore>,
}

impl JobPermit {
    /// Number of slots currently held, including this one.
    pub fn active_jobs(&self) -> usize {
        self.max - self.sem.available_permits()
    }

    pub fn available_slots(&self) -> usize {
        self.sem.available_permits()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
