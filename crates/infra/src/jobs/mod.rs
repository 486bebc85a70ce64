//! Job registry with single-execution start semantics.
//!
//! ## Design
//!
//! - Jobs are created `Waiting` and started at most once
//! - Starting takes a per-job distributed lock, so concurrent starts from any
//!   number of service instances run the workload once
//! - The store is the source of truth; the terminal status is saved before the
//!   lock is released
//!
//! ## Components
//!
//! - `JobStore`: Persistence for jobs (in-memory or Postgres)
//! - `JobLockCoordinator`: Lock acquisition policy + scoped release
//! - `Workload`: The work run while a job holds its lock
//! - `JobService`: The create/list/start pipeline

pub mod coordinator;
pub mod postgres;
pub mod service;
pub mod store;
pub mod workload;

pub use coordinator::{JobLockCoordinator, JobLockGuard, LockPolicy};
pub use postgres::PostgresJobStore;
pub use service::JobService;
pub use store::{InMemoryJobStore, JobStore, JobStoreError};
pub use workload::{SleepWorkload, Workload};
