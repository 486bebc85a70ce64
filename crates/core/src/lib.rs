//! `joblock-core`: job domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the job record, its status rules, and the error taxonomy shared by the
//! pipeline and the request layer.

pub mod error;
pub mod id;
pub mod interrupt;
pub mod job;
pub mod transition;

pub use error::{JobError, JobResult, WorkloadError};
pub use id::JobId;
pub use interrupt::Interrupt;
pub use job::{Job, JobStatus, JobView};
pub use transition::ensure_startable;
