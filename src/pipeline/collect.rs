//! Collect stage — fetches the trip of a Done job and stores it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::backend::JobService;
use crate::model::ParsingJob;
use crate::store::TripStore;

use super::queues::{pause, receive};

pub(crate) struct CollectStage {
    jobs: Arc<dyn JobService>,
    store: Arc<dyn TripStore>,
    job_interval: Duration,
    input: mpsc::Receiver<ParsingJob>,
}

impl CollectStage {
    pub fn new(
        jobs: Arc<dyn JobService>,
        store: Arc<dyn TripStore>,
        job_interval: Duration,
        input: mpsc::Receiver<ParsingJob>,
    ) -> Self {
        Self {
            jobs,
            store,
            job_interval,
            input,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Collect stage started");

        while let Some(job) = receive(&mut self.input, &shutdown).await {
            self.collect(&job).await;

            if !pause(self.job_interval, &shutdown).await {
                break;
            }
        }

        info!("Collect stage stopped");
    }

    /// Fetch the result and store its trip. Failures are logged, never retried.
    async fn collect(&self, job: &ParsingJob) {
        let result = match self.jobs.job_result(job).await {
            Ok(result) => result,
            Err(e) => {
                error!(job_id = %job.id, subject = %job.subject, error = %e, "Fetching job result failed, dropping job");
                return;
            }
        };

        if !result.warnings.is_empty() {
            info!(job_id = %result.id, warnings = ?result.warnings, "Job result carries warnings");
        }

        let Some(trip) = result.trip else {
            error!(job_id = %result.id, subject = %result.subject, "Job result has no trip, dropping job");
            return;
        };

        match self.store.create(&trip).await {
            Ok(()) => info!(
                job_id = %result.id,
                trip_id = %trip.id,
                reference = %trip.reference,
                steps = trip.steps.len(),
                "Trip stored"
            ),
            Err(e) => error!(
                job_id = %result.id,
                reference = %trip.reference,
                error = %e,
                "Storing trip failed, dropping job"
            ),
        }
    }
}
