//! Start-transition rules.
//!
//! Pure decision logic: given what the store returned for an identifier,
//! decide whether the job may be started. Callers must pass the store's
//! current value, never a cached copy.

use crate::error::{JobError, JobResult};
use crate::id::JobId;
use crate::job::{Job, JobStatus};

/// Validate a start request against the located record.
///
/// - missing record → `NotFound`
/// - any status other than `Waiting` → `AlreadyProcessed` (a job runs at most
///   once, whether it succeeded or not)
pub fn ensure_startable(id: JobId, located: Option<Job>) -> JobResult<Job> {
    let job = located.ok_or(JobError::NotFound(id))?;
    match job.status {
        JobStatus::Waiting => Ok(job),
        JobStatus::Running | JobStatus::Success | JobStatus::Error => {
            Err(JobError::AlreadyProcessed(id))
        }
    }
}
