//! Email source and job service traits.

use async_trait::async_trait;

use crate::error::{JobServiceError, SourceError};
use crate::model::{Email, ParsingJob};

/// Supplies batches of emails on demand.
#[async_trait]
pub trait EmailSource: Send + Sync {
    /// Fetch every email matching `filter`. An empty batch is not an error.
    async fn fetch(&self, filter: &str) -> Result<Vec<Email>, SourceError>;
}

/// Asynchronous parsing job service.
///
/// Implementations map their provider's status vocabulary onto
/// [`JobStatus`](crate::model::JobStatus) before returning, typically through
/// [`ProviderStatus`](crate::provider::ProviderStatus).
#[async_trait]
pub trait JobService: Send + Sync {
    /// Submit the raw content of `email` and return the created job.
    async fn create_job(&self, email: &Email) -> Result<ParsingJob, JobServiceError>;

    /// Return a fresh status snapshot for `job`.
    async fn job_status(&self, job: &ParsingJob) -> Result<ParsingJob, JobServiceError>;

    /// Return the snapshot of a Done job with its trip populated.
    async fn job_result(&self, job: &ParsingJob) -> Result<ParsingJob, JobServiceError>;
}
