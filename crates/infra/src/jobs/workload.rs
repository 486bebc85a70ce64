//! Work executed while a job holds its lock.

use std::time::Duration;

use joblock_core::{Interrupt, Job, WorkloadError};

/// A unit of work run synchronously on the calling thread.
///
/// Implementations should watch `interrupt` during long waits and return
/// [`WorkloadError::Interrupted`] when it fires.
pub trait Workload: Send + Sync {
    fn run(&self, job: &Job, interrupt: &Interrupt) -> Result<(), WorkloadError>;
}

impl<F> Workload for F
where
    F: Fn(&Job, &Interrupt) -> Result<(), WorkloadError> + Send + Sync,
{
    fn run(&self, job: &Job, interrupt: &Interrupt) -> Result<(), WorkloadError> {
        self(job, interrupt)
    }
}

/// Placeholder workload: an interruptible sleep.
#[derive(Debug, Clone, Copy)]
pub struct SleepWorkload {
    duration: Duration,
}

impl SleepWorkload {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl Default for SleepWorkload {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl Workload for SleepWorkload {
    fn run(&self, _job: &Job, interrupt: &Interrupt) -> Result<(), WorkloadError> {
        if interrupt.wait_timeout(self.duration) {
            return Err(WorkloadError::Interrupted);
        }
        Ok(())
    }
}
