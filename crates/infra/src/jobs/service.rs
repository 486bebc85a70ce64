//! Job processing pipeline.
//!
//! `start_job` runs a fixed sequence:
//!
//! 1. fetch the record from the store
//! 2. validate the start transition (`NotFound` / `AlreadyProcessed`)
//! 3. acquire the job's lock (`Locked`)
//! 4. re-read the record under the lock, so a start that lost the race to an
//!    already finished run is rejected instead of running twice
//! 5. run the workload; any failure, interruption or panic becomes `Error`
//! 6. stamp `end_date`, save, then release the lock
//!
//! Persisting before releasing means anyone who acquires the lock next sees
//! the terminal status.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use joblock_core::{
    Interrupt, Job, JobError, JobId, JobResult, JobView, WorkloadError, ensure_startable,
};

use super::coordinator::{JobLockCoordinator, JobLockGuard};
use super::store::JobStore;
use super::workload::Workload;

/// Create, list and start jobs.
#[derive(Clone)]
pub struct JobService {
    store: Arc<dyn JobStore>,
    locks: JobLockCoordinator,
    workload: Arc<dyn Workload>,
    interrupt: Interrupt,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        locks: JobLockCoordinator,
        workload: Arc<dyn Workload>,
    ) -> Self {
        Self {
            store,
            locks,
            workload,
            interrupt: Interrupt::new(),
        }
    }

    /// Share an externally owned interrupt (e.g. the process shutdown signal).
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// Every job in its external representation.
    pub fn list_jobs(&self) -> JobResult<Vec<JobView>> {
        Ok(self.store.find_all()?.iter().map(JobView::from).collect())
    }

    /// Persist a new `Waiting` job and return its assigned id.
    #[instrument(skip(self))]
    pub fn create_job(&self, name: &str) -> JobResult<JobId> {
        let saved = self.store.save(Job::new(name))?;
        let id = saved
            .id
            .ok_or_else(|| JobError::store("store returned a job without an id"))?;
        info!(job_id = %id, "created job");
        Ok(id)
    }

    /// Run a job exactly once.
    ///
    /// Returns `Ok(())` once the job reached a terminal status, including when
    /// the workload itself failed; inspect the stored status for the outcome.
    #[instrument(skip(self, id), fields(job_id = %id))]
    pub fn start_job(&self, id: JobId) -> JobResult<()> {
        let located = self.store.find_by_id(id)?;
        ensure_startable(id, located).inspect_err(|e| warn!(error = %e, "rejected job start"))?;

        let guard = self.locks.acquire_for(id, &self.interrupt)?;

        let job = ensure_startable(id, self.store.find_by_id(id)?)
            .inspect_err(|e| warn!(error = %e, "job finished while waiting for its lock"))?;
        self.process(job, guard)
    }

    fn process(&self, mut job: Job, guard: JobLockGuard) -> JobResult<()> {
        job.mark_running(Utc::now());
        info!(job = %job.view(), "starting to process job");

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.workload.run(&job, &self.interrupt)
        }))
        .unwrap_or_else(|panic| Err(WorkloadError::failed(panic_message(panic.as_ref()))));

        match &outcome {
            Ok(()) => info!(job = %job.view(), "successfully processed job"),
            Err(e) => error!(job = %job.view(), error = %e, "failed to process job"),
        }

        job.mark_finished(outcome.is_ok(), Utc::now());
        let saved = self.store.save(job);
        let job_id = guard.job_id();
        drop(guard);

        saved.map(|_| ()).map_err(|e| {
            error!(job_id = %job_id, error = %e, "failed to record job outcome");
            e.into()
        })
    }
}

impl core::fmt::Debug for JobService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JobService")
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("workload panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("workload panicked: {s}")
    } else {
        "workload panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Barrier, Mutex};
    use std::thread;
    use std::time::Duration;

    use joblock_core::JobStatus;

    use crate::jobs::coordinator::LockPolicy;
    use crate::jobs::store::{InMemoryJobStore, JobStoreError};
    use crate::jobs::workload::SleepWorkload;
    use crate::locks::{DistributedLock, InMemoryLockRegistry, LockError, LockRegistry};

    const ID: i64 = 15;
    const NAME: &str = "SOME_JOB";

    type CallLog = Arc<Mutex<Vec<String>>>;

    fn calls(log: &CallLog) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    /// In-memory store that records the calls the pipeline makes.
    struct RecordingStore {
        inner: InMemoryJobStore,
        log: CallLog,
        fail_saves: AtomicBool,
    }

    impl RecordingStore {
        fn new(log: CallLog) -> Self {
            Self {
                inner: InMemoryJobStore::new(),
                log,
                fail_saves: AtomicBool::new(false),
            }
        }

        fn seed(&self, status: JobStatus) {
            let mut job = Job::new(NAME).with_id(JobId::new(ID));
            job.status = status;
            self.inner.save(job).unwrap();
        }

        fn stored(&self) -> Job {
            self.inner.find_by_id(JobId::new(ID)).unwrap().unwrap()
        }
    }

    impl JobStore for RecordingStore {
        fn find_all(&self) -> Result<Vec<Job>, JobStoreError> {
            self.log.lock().unwrap().push("find_all".to_string());
            self.inner.find_all()
        }

        fn find_by_id(&self, id: JobId) -> Result<Option<Job>, JobStoreError> {
            self.log.lock().unwrap().push("find_by_id".to_string());
            self.inner.find_by_id(id)
        }

        fn save(&self, job: Job) -> Result<Job, JobStoreError> {
            self.log.lock().unwrap().push("save".to_string());
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(JobStoreError::Storage("connection reset".to_string()));
            }
            self.inner.save(job)
        }
    }

    /// Lock registry whose handles always answer `acquire` with a fixed value.
    struct ScriptedRegistry {
        log: CallLog,
        grant: bool,
    }

    struct ScriptedLock {
        key: String,
        log: CallLog,
        grant: bool,
        held: bool,
    }

    impl LockRegistry for ScriptedRegistry {
        fn obtain(&self, key: &str) -> Box<dyn DistributedLock> {
            self.log.lock().unwrap().push(format!("obtain:{key}"));
            Box::new(ScriptedLock {
                key: key.to_string(),
                log: self.log.clone(),
                grant: self.grant,
                held: false,
            })
        }
    }

    impl DistributedLock for ScriptedLock {
        fn key(&self) -> &str {
            &self.key
        }

        fn try_acquire(&mut self) -> Result<bool, LockError> {
            self.log.lock().unwrap().push("try_acquire".to_string());
            self.held = self.grant;
            Ok(self.grant)
        }

        fn try_acquire_for(
            &mut self,
            _timeout: Duration,
            _interrupt: &Interrupt,
        ) -> Result<bool, LockError> {
            self.log.lock().unwrap().push("try_acquire_for".to_string());
            self.held = self.grant;
            Ok(self.grant)
        }

        fn release(&mut self) -> Result<(), LockError> {
            let entry = if self.held { "release" } else { "release:unheld" };
            self.log.lock().unwrap().push(entry.to_string());
            self.held = false;
            Ok(())
        }

        fn is_held(&self) -> bool {
            self.held
        }
    }

    fn scripted_service(
        grant: bool,
        workload: Arc<dyn Workload>,
    ) -> (JobService, Arc<RecordingStore>, CallLog) {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(RecordingStore::new(log.clone()));
        let registry = Arc::new(ScriptedRegistry {
            log: log.clone(),
            grant,
        });
        let service = JobService::new(
            store.clone(),
            JobLockCoordinator::new(registry, LockPolicy::NonBlocking),
            workload,
        );
        (service, store, log)
    }

    fn ok_workload() -> Arc<dyn Workload> {
        Arc::new(|_: &Job, _: &Interrupt| -> Result<(), WorkloadError> { Ok(()) })
    }

    #[test]
    fn start_job_runs_in_fixed_order_and_records_success() {
        let (service, store, log) = scripted_service(true, ok_workload());
        store.seed(JobStatus::Waiting);

        service.start_job(JobId::new(ID)).unwrap();

        assert_eq!(
            calls(&log),
            vec!["find_by_id", "obtain:15", "try_acquire", "find_by_id", "save", "release"]
        );

        let saved = store.stored();
        assert_eq!(saved.name, NAME);
        assert_eq!(saved.status, JobStatus::Success);
        let (start, end) = (saved.start_date.unwrap(), saved.end_date.unwrap());
        assert!(start <= end);
    }

    #[test]
    fn workload_failure_is_recorded_not_raised() {
        let failing: Arc<dyn Workload> = Arc::new(|_: &Job, _: &Interrupt| -> Result<(), WorkloadError> {
            Err(WorkloadError::failed("upstream timeout"))
        });
        let (service, store, log) = scripted_service(true, failing);
        store.seed(JobStatus::Waiting);

        assert_eq!(service.start_job(JobId::new(ID)), Ok(()));

        let saved = store.stored();
        assert_eq!(saved.status, JobStatus::Error);
        assert!(saved.start_date.is_some());
        assert!(saved.end_date.is_some());
        assert_eq!(calls(&log).last().map(String::as_str), Some("release"));
    }

    #[test]
    fn workload_panic_is_recorded_as_error() {
        let panicking: Arc<dyn Workload> = Arc::new(|_: &Job, _: &Interrupt| -> Result<(), WorkloadError> {
            panic!("boom")
        });
        let (service, store, log) = scripted_service(true, panicking);
        store.seed(JobStatus::Waiting);

        assert_eq!(service.start_job(JobId::new(ID)), Ok(()));
        assert_eq!(store.stored().status, JobStatus::Error);
        assert_eq!(calls(&log).last().map(String::as_str), Some("release"));
    }

    #[test]
    fn interrupted_workload_is_recorded_as_error() {
        let (service, store, _log) =
            scripted_service(true, Arc::new(SleepWorkload::new(Duration::from_secs(30))));
        store.seed(JobStatus::Waiting);
        service.interrupt().trigger();

        assert_eq!(service.start_job(JobId::new(ID)), Ok(()));

        let saved = store.stored();
        assert_eq!(saved.status, JobStatus::Error);
        assert!(saved.end_date.is_some());
    }

    #[test]
    fn unknown_job_touches_neither_lock_nor_save() {
        let (service, _store, log) = scripted_service(true, ok_workload());

        let err = service.start_job(JobId::new(ID)).unwrap_err();

        assert_eq!(err, JobError::NotFound(JobId::new(ID)));
        assert_eq!(err.to_string(), "Job not found for id=15");
        assert_eq!(calls(&log), vec!["find_by_id"]);
    }

    #[test]
    fn processed_job_touches_neither_lock_nor_save() {
        for status in [JobStatus::Running, JobStatus::Success, JobStatus::Error] {
            let (service, store, log) = scripted_service(true, ok_workload());
            store.seed(status);

            let err = service.start_job(JobId::new(ID)).unwrap_err();

            assert_eq!(err, JobError::AlreadyProcessed(JobId::new(ID)));
            assert_eq!(calls(&log), vec!["find_by_id"]);
            assert_eq!(store.stored().status, status);
        }
    }

    #[test]
    fn locked_job_is_not_saved_and_handle_is_released() {
        let (service, store, log) = scripted_service(false, ok_workload());
        store.seed(JobStatus::Waiting);

        let err = service.start_job(JobId::new(ID)).unwrap_err();

        assert_eq!(err, JobError::Locked(JobId::new(ID)));
        assert_eq!(err.to_string(), "Job locked for id=15");
        assert_eq!(
            calls(&log),
            vec!["find_by_id", "obtain:15", "try_acquire", "release:unheld"]
        );
        assert_eq!(store.stored().status, JobStatus::Waiting);
    }

    #[test]
    fn failed_final_save_still_releases_the_lock() {
        let (service, store, log) = scripted_service(true, ok_workload());
        store.seed(JobStatus::Waiting);
        store.fail_saves.store(true, Ordering::SeqCst);

        let err = service.start_job(JobId::new(ID)).unwrap_err();

        assert!(matches!(err, JobError::Store(_)));
        assert_eq!(calls(&log).last().map(String::as_str), Some("release"));
    }

    fn in_memory_service(
        workload: Arc<dyn Workload>,
    ) -> (JobService, Arc<InMemoryLockRegistry>) {
        let registry = InMemoryLockRegistry::arc("joblock", Duration::from_secs(60));
        let service = JobService::new(
            InMemoryJobStore::arc(),
            JobLockCoordinator::new(registry.clone(), LockPolicy::NonBlocking),
            workload,
        );
        (service, registry)
    }

    #[test]
    fn create_then_start_twice() {
        let (service, registry) = in_memory_service(ok_workload());

        let id = service.create_job("Nightly Export").unwrap();
        assert_eq!(id, JobId::new(1));

        service.start_job(id).unwrap();
        let jobs = service.list_jobs().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Success);
        assert!(!registry.is_locked(&id.lock_key()));

        let err = service.start_job(id).unwrap_err();
        assert_eq!(err.to_string(), "Job already processed for id=1");
    }

    #[test]
    fn created_job_is_listed_as_waiting() {
        let (service, _registry) = in_memory_service(ok_workload());
        service.create_job("report").unwrap();

        let jobs = service.list_jobs().unwrap();
        assert_eq!(jobs[0].status, JobStatus::Waiting);
        assert!(jobs[0].start_date.is_none());
        assert!(jobs[0].end_date.is_none());
    }

    #[test]
    fn racing_starts_execute_the_workload_once() {
        const RACERS: usize = 8;

        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let workload: Arc<dyn Workload> = Arc::new(move |_: &Job, _: &Interrupt| -> Result<(), WorkloadError> {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            Ok(())
        });
        let (service, registry) = in_memory_service(workload);
        let id = service.create_job("race").unwrap();

        let barrier = Arc::new(Barrier::new(RACERS));
        let handles: Vec<_> = (0..RACERS)
            .map(|_| {
                let service = service.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    service.start_job(id)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for result in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(
                result,
                JobError::Locked(_) | JobError::AlreadyProcessed(_)
            ));
        }
        assert!(!registry.is_locked(&id.lock_key()));
    }
}
