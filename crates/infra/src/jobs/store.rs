//! Job storage implementations.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use joblock_core::{Job, JobError, JobId};

/// Durable keyed storage for job records.
///
/// The store is the single source of truth for job status; nothing in the
/// pipeline caches a record across calls.
pub trait JobStore: Send + Sync {
    /// Current snapshot of every job. Order is store-defined.
    fn find_all(&self) -> Result<Vec<Job>, JobStoreError>;

    /// Look up a job. Absence is not an error.
    fn find_by_id(&self, id: JobId) -> Result<Option<Job>, JobStoreError>;

    /// Upsert by id. A job without an id is assigned a fresh one, and the
    /// stored record is returned with it populated. Durable before returning.
    fn save(&self, job: Job) -> Result<Job, JobStoreError>;
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<JobStoreError> for JobError {
    fn from(value: JobStoreError) -> Self {
        JobError::store(value.to_string())
    }
}

/// In-memory job store for tests/dev.
///
/// Identifiers come from a sequence starting at 1.
#[derive(Debug)]
pub struct InMemoryJobStore {
    jobs: RwLock<BTreeMap<JobId, Job>>,
    next_id: AtomicI64,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore for InMemoryJobStore {
    fn find_all(&self) -> Result<Vec<Job>, JobStoreError> {
        let jobs = self
            .jobs
            .read()
            .map_err(|_| JobStoreError::Storage("lock poisoned".to_string()))?;
        Ok(jobs.values().cloned().collect())
    }

    fn find_by_id(&self, id: JobId) -> Result<Option<Job>, JobStoreError> {
        let jobs = self
            .jobs
            .read()
            .map_err(|_| JobStoreError::Storage("lock poisoned".to_string()))?;
        Ok(jobs.get(&id).cloned())
    }

    fn save(&self, mut job: Job) -> Result<Job, JobStoreError> {
        let mut jobs = self
            .jobs
            .write()
            .map_err(|_| JobStoreError::Storage("lock poisoned".to_string()))?;

        let id = match job.id {
            Some(id) => id,
            None => {
                let id = JobId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
                job.id = Some(id);
                id
            }
        };

        jobs.insert(id, job.clone());
        Ok(job)
    }
}

impl<S: JobStore + ?Sized> JobStore for Arc<S> {
    fn find_all(&self) -> Result<Vec<Job>, JobStoreError> {
        (**self).find_all()
    }

    fn find_by_id(&self, id: JobId) -> Result<Option<Job>, JobStoreError> {
        (**self).find_by_id(id)
    }

    fn save(&self, job: Job) -> Result<Job, JobStoreError> {
        (**self).save(job)
    }
}
