//! Concurrent job dispatch under the per-key connection cap.

pub mod dispatcher;
pub mod scheduler;

pub use dispatcher::{BatchResults, FailurePolicy, JobDispatcher, JobOutcome};
pub use scheduler::{JobPermit, JobScheduler};
