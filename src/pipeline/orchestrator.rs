//! Pipeline orchestrator — wires the stages together and owns shutdown.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::backend::{EmailSource, JobService};
use crate::config::PipelineConfig;
use crate::store::TripStore;

use super::collect::CollectStage;
use super::fetch::FetchStage;
use super::poll::PollStage;
use super::queues::PipelineQueues;
use super::submit::SubmitStage;

/// A configured, not yet running pipeline.
pub struct TripPipeline {
    config: PipelineConfig,
    source: Arc<dyn EmailSource>,
    jobs: Arc<dyn JobService>,
    store: Arc<dyn TripStore>,
    shutdown: CancellationToken,
}

impl TripPipeline {
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn EmailSource>,
        jobs: Arc<dyn JobService>,
        store: Arc<dyn TripStore>,
    ) -> Self {
        Self {
            config,
            source,
            jobs,
            store,
            shutdown: CancellationToken::new(),
        }
    }

    /// Get the cancellation token before starting, e.g. to tie it to a signal.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawn the four stages and return immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> PipelineHandle {
        let PipelineQueues {
            submit_tx,
            submit_rx,
            poll_tx,
            poll_rx,
            collect_tx,
            collect_rx,
        } = PipelineQueues::new(self.config.queue_capacity);

        let fetch = FetchStage::new(
            self.source,
            self.config.mail_filter.clone(),
            self.config.fetch_interval,
            submit_tx,
        );
        let submit = SubmitStage::new(
            self.jobs.clone(),
            self.config.job_interval,
            submit_rx,
            poll_tx,
        );
        let poll = PollStage::new(
            self.jobs.clone(),
            self.config.job_interval,
            self.config.status_failure_policy,
            self.config.max_outstanding_rechecks,
            poll_rx,
            collect_tx,
        );
        let collect = CollectStage::new(self.jobs, self.store, self.config.job_interval, collect_rx);

        let tracker = TaskTracker::new();
        tracker.spawn(fetch.run(self.shutdown.clone()));
        tracker.spawn(submit.run(self.shutdown.clone()));
        tracker.spawn(poll.run(self.shutdown.clone()));
        tracker.spawn(collect.run(self.shutdown.clone()));
        tracker.close();

        info!(
            fetch_interval_ms = self.config.fetch_interval.as_millis() as u64,
            job_interval_ms = self.config.job_interval.as_millis() as u64,
            queue_capacity = self.config.queue_capacity,
            "Trip pipeline started"
        );

        PipelineHandle {
            shutdown: self.shutdown,
            tracker,
        }
    }
}

/// Handle on a running pipeline.
///
/// Dropping the handle does not stop the stages; call [`shutdown`](Self::shutdown).
pub struct PipelineHandle {
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl PipelineHandle {
    /// Signal every stage to stop and wait until all of them have exited.
    pub async fn shutdown(self) {
        info!("Shutting down trip pipeline...");
        self.shutdown.cancel();
        self.tracker.wait().await;
        info!("Trip pipeline stopped");
    }

    /// Wait for the stages to exit without signalling them.
    pub async fn stopped(&self) {
        self.tracker.wait().await;
    }

    /// Get the cancellation token for external shutdown coordination
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Number of stage tasks still running.
    pub fn running_stages(&self) -> usize {
        self.tracker.len()
    }
}
