//! Job error model.

use thiserror::Error;

use crate::id::JobId;

/// Result type used across the job pipeline.
pub type JobResult<T> = Result<T, JobError>;

/// Outcome of a rejected job operation.
///
/// `NotFound`, `AlreadyProcessed` and `Locked` are control-flow signals raised
/// before any mutation happens. The remaining variants are infrastructure
/// failures the request layer reports as server-side errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    /// No record exists for the identifier.
    #[error("Job not found for id={0}")]
    NotFound(JobId),

    /// The record left `Waiting` already; a job runs at most once.
    #[error("Job already processed for id={0}")]
    AlreadyProcessed(JobId),

    /// Another execution currently holds exclusivity for the identifier.
    #[error("Job locked for id={0}")]
    Locked(JobId),

    /// The blocking lock wait was interrupted. Not retried.
    #[error("Job lock wait interrupted for id={0}")]
    LockInterrupted(JobId),

    /// The lock backend failed (connection, protocol).
    #[error("lock backend error: {0}")]
    LockBackend(String),

    /// The job store failed.
    #[error("job store error: {0}")]
    Store(String),

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl JobError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn lock_backend(msg: impl Into<String>) -> Self {
        Self::LockBackend(msg.into())
    }

    /// True for the rejections a caller may legitimately see under duplicate
    /// or concurrent start requests.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            JobError::NotFound(_) | JobError::AlreadyProcessed(_) | JobError::Locked(_)
        )
    }
}

/// Failure reported by a workload.
///
/// Never crosses the `start_job` boundary: the pipeline records it as an
/// `Error` status on the job.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkloadError {
    /// The executing thread was asked to stop.
    #[error("workload interrupted")]
    Interrupted,

    /// The workload itself failed.
    #[error("workload failed: {0}")]
    Failed(String),
}

impl WorkloadError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}
