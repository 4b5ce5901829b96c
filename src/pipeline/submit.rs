//! Submit stage — one parsing job per email, at most once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::backend::JobService;
use crate::model::{Email, ParsingJob};

use super::queues::{forward, pause, receive};

pub(crate) struct SubmitStage {
    jobs: Arc<dyn JobService>,
    job_interval: Duration,
    input: mpsc::Receiver<Email>,
    output: mpsc::Sender<ParsingJob>,
}

impl SubmitStage {
    pub fn new(
        jobs: Arc<dyn JobService>,
        job_interval: Duration,
        input: mpsc::Receiver<Email>,
        output: mpsc::Sender<ParsingJob>,
    ) -> Self {
        Self {
            jobs,
            job_interval,
            input,
            output,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Submit stage started");

        while let Some(email) = receive(&mut self.input, &shutdown).await {
            if let Some(job) = self.submit(&email).await {
                if !forward(&self.output, job, &shutdown, "submit").await {
                    break;
                }
            }

            if !pause(self.job_interval, &shutdown).await {
                break;
            }
        }

        info!("Submit stage stopped");
    }

    /// Create the job. A failure drops the email with a single error line.
    async fn submit(&self, email: &Email) -> Option<ParsingJob> {
        match self.jobs.create_job(email).await {
            Ok(job) if job.id.as_str().is_empty() => {
                error!(subject = %email.subject, "Job service returned an empty job id, dropping email");
                None
            }
            Ok(job) => {
                debug!(job_id = %job.id, subject = %job.subject, status = %job.status, "Parsing job created");
                Some(job)
            }
            Err(e) => {
                error!(subject = %email.subject, error = %e, "Job creation failed, dropping email");
                None
            }
        }
    }
}
