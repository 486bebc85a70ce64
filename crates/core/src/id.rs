//! Strongly-typed job identifier.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Identifier of a job record.
///
/// Assigned by the job store on first save and never reassigned. Stores hand
/// out a monotonically increasing sequence, so identifiers are small positive
/// integers (the first job created is `1`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(i64);

impl JobId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Key used to scope distributed exclusivity for this job.
    ///
    /// Every job gets its own key, so unrelated jobs never contend.
    pub fn lock_key(&self) -> String {
        self.0.to_string()
    }
}

impl core::fmt::Display for JobId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for JobId {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = i64::from_str(s.trim())
            .map_err(|e| JobError::invalid_id(format!("JobId: {e}")))?;
        Ok(Self(value))
    }
}
