//! Parsing job snapshots.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::trip::Trip;

/// Opaque job identifier assigned by the job service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Canonical job status as seen by the pipeline.
///
/// Provider vocabularies are mapped onto these three values at the job
/// service boundary (see [`crate::provider::ProviderStatus`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Done,
    Error,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Error => "error",
        })
    }
}

/// Snapshot of a parsing job.
///
/// Every status check returns a new snapshot that replaces the previous one
/// wholesale; snapshots are never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsingJob {
    pub id: JobId,
    /// Subject of the originating email, carried for diagnostics.
    pub subject: String,
    pub status: JobStatus,
    /// Non-fatal warnings reported by the provider.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Only set when `status` is [`JobStatus::Error`].
    pub detail: Option<String>,
    /// Only set once the job is Done and its result has been fetched.
    pub trip: Option<Trip>,
}

impl ParsingJob {
    /// A freshly created job with no warnings, detail or trip.
    pub fn new(id: impl Into<JobId>, subject: impl Into<String>, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            status,
            warnings: Vec::new(),
            detail: None,
            trip: None,
        }
    }

    /// A snapshot in Error state carrying the provider's detail string.
    pub fn failed(
        id: impl Into<JobId>,
        subject: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::new(id, subject, JobStatus::Error)
        }
    }

    /// A Done snapshot with its trip populated.
    pub fn with_trip(mut self, trip: Trip) -> Self {
        self.status = JobStatus::Done;
        self.trip = Some(trip);
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
