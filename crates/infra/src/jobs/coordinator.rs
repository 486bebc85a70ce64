//! Per-job lock acquisition.
//!
//! Wraps a [`LockRegistry`] with an acquisition policy and maps backend
//! outcomes onto [`JobError`]. The returned [`JobLockGuard`] releases the
//! lock when dropped, so every exit path of the protected step gives the key
//! back.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use joblock_core::{Interrupt, JobError, JobId, JobResult};

use crate::locks::{DistributedLock, LockError, LockRegistry};

/// How a start request competes for a job's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPolicy {
    /// One attempt; a concurrent start is rejected with `Locked` immediately.
    NonBlocking,
    /// Wait up to `timeout` for the current holder before rejecting.
    Blocking { timeout: Duration },
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self::NonBlocking
    }
}

/// Acquires exclusivity for individual jobs.
#[derive(Clone)]
pub struct JobLockCoordinator {
    registry: Arc<dyn LockRegistry>,
    policy: LockPolicy,
}

impl JobLockCoordinator {
    pub fn new(registry: Arc<dyn LockRegistry>, policy: LockPolicy) -> Self {
        Self { registry, policy }
    }

    /// Acquire the lock for `id` under the configured policy.
    ///
    /// The key is the job identifier, so jobs never contend with each other.
    /// On rejection the obtained handle is still released (a no-op for an
    /// unheld handle) before `Locked` is returned.
    pub fn acquire_for(&self, id: JobId, interrupt: &Interrupt) -> JobResult<JobLockGuard> {
        let mut guard = JobLockGuard {
            job_id: id,
            lock: self.registry.obtain(&id.lock_key()),
        };

        let acquired = match self.policy {
            LockPolicy::NonBlocking => guard.lock.try_acquire(),
            LockPolicy::Blocking { timeout } => guard.lock.try_acquire_for(timeout, interrupt),
        };

        match acquired {
            Ok(true) => {
                debug!(job_id = %id, lock_key = %guard.lock.key(), "acquired job lock");
                Ok(guard)
            }
            Ok(false) => {
                warn!(job_id = %id, lock_key = %guard.lock.key(), "job lock held elsewhere");
                Err(JobError::Locked(id))
            }
            Err(LockError::Interrupted) => {
                warn!(job_id = %id, "interrupted while waiting for job lock");
                Err(JobError::LockInterrupted(id))
            }
            Err(LockError::Backend(msg)) => {
                error!(job_id = %id, error = %msg, "lock backend failed");
                Err(JobError::lock_backend(msg))
            }
        }
    }
}

impl core::fmt::Debug for JobLockCoordinator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JobLockCoordinator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Scoped ownership of a job's lock. Releases on drop.
pub struct JobLockGuard {
    job_id: JobId,
    lock: Box<dyn DistributedLock>,
}

impl JobLockGuard {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn key(&self) -> &str {
        self.lock.key()
    }
}

impl Drop for JobLockGuard {
    fn drop(&mut self) {
        // Best-effort: the lease expiry reclaims the key if this fails.
        if let Err(e) = self.lock.release() {
            error!(job_id = %self.job_id, error = %e, "failed to release job lock");
        }
    }
}
