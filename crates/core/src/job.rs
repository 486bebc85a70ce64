//! Job record and its external representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::JobId;

/// Job lifecycle status.
///
/// `Running` is only ever held in memory by the executing pipeline; stores see
/// `Waiting` until the terminal status is written.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Waiting,
    Running,
    Success,
    Error,
}

impl JobStatus {
    /// `Success` and `Error` are final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "WAITING",
            JobStatus::Running => "RUNNING",
            JobStatus::Success => "SUCCESS",
            JobStatus::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "WAITING" => Some(JobStatus::Waiting),
            "RUNNING" => Some(JobStatus::Running),
            "SUCCESS" => Some(JobStatus::Success),
            "ERROR" => Some(JobStatus::Error),
            _ => None,
        }
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job record.
///
/// `id` is `None` until the store assigns one. `name` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: Option<JobId>,
    pub name: String,
    pub status: JobStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new, unsaved job in `Waiting` status.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            status: JobStatus::Waiting,
            start_date: None,
            end_date: None,
        }
    }

    /// Attach a store-assigned identifier.
    pub fn with_id(mut self, id: JobId) -> Self {
        self.id = Some(id);
        self
    }

    /// Mark the job as running. Called once exclusivity is held.
    pub fn mark_running(&mut self, at: DateTime<Utc>) {
        self.status = JobStatus::Running;
        self.start_date = Some(at);
    }

    /// Record the terminal outcome.
    ///
    /// `end_date` never precedes `start_date`, even if the wall clock stepped
    /// backwards while the workload ran.
    pub fn mark_finished(&mut self, succeeded: bool, at: DateTime<Utc>) {
        self.status = if succeeded {
            JobStatus::Success
        } else {
            JobStatus::Error
        };
        let end = match self.start_date {
            Some(start) if start > at => start,
            _ => at,
        };
        self.end_date = Some(end);
    }

    pub fn view(&self) -> JobView {
        JobView::from(self)
    }
}

/// External representation of a job (list responses, logs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobView {
    pub id: Option<JobId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    pub status: JobStatus,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            name: job.name.clone(),
            start_date: job.start_date,
            end_date: job.end_date,
            status: job.status,
        }
    }
}

impl core::fmt::Display for JobView {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        fn opt<T: core::fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map_or_else(|| "None".to_string(), ToString::to_string)
        }

        write!(
            f,
            "{{ id={}, name=\"{}\", start_date={}, end_date={}, status={}}}",
            opt(&self.id),
            self.name,
            opt(&self.start_date),
            opt(&self.end_date),
            self.status
        )
    }
}
