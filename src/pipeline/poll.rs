//! Poll stage — drives each job to a terminal state.
//!
//! Work comes from two places: fresh jobs on the input queue and re-checks
//! coming due on the stage's own [`RecheckQueue`]. When both are ready the
//! stage takes from them in turn. When the re-check queue is full the stage
//! stops taking fresh jobs, which backs up the Submit stage.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backend::JobService;
use crate::config::StatusCheckFailurePolicy;
use crate::model::{JobStatus, ParsingJob};

use super::queues::{forward, pause};
use super::recheck::{Recheck, RecheckQueue};

pub(crate) struct PollStage {
    jobs: Arc<dyn JobService>,
    job_interval: Duration,
    policy: StatusCheckFailurePolicy,
    rechecks: RecheckQueue,
    input: mpsc::Receiver<ParsingJob>,
    input_open: bool,
    fresh_first: bool,
    output: mpsc::Sender<ParsingJob>,
}

/// Where the next job came from.
enum Ready {
    Fresh(Option<ParsingJob>),
    Due(Recheck),
}

/// What to do with the stage after one item.
enum Outcome {
    Continue,
    Stop,
}

impl PollStage {
    pub fn new(
        jobs: Arc<dyn JobService>,
        job_interval: Duration,
        policy: StatusCheckFailurePolicy,
        max_outstanding_rechecks: usize,
        input: mpsc::Receiver<ParsingJob>,
        output: mpsc::Sender<ParsingJob>,
    ) -> Self {
        Self {
            jobs,
            job_interval,
            policy,
            rechecks: RecheckQueue::new(max_outstanding_rechecks),
            input,
            input_open: true,
            fresh_first: true,
            output,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            interval_ms = self.job_interval.as_millis() as u64,
            max_rechecks = self.rechecks.capacity(),
            "Poll stage started"
        );

        while let Some(item) = self.next_item(&shutdown).await {
            if let Outcome::Stop = self.check(item, &shutdown).await {
                break;
            }

            if !pause(self.job_interval, &shutdown).await {
                break;
            }
        }

        if !self.rechecks.is_empty() {
            debug!(abandoned = self.rechecks.len(), "Dropping outstanding re-checks");
        }
        info!("Poll stage stopped");
    }

    /// Take the next job to check, alternating between fresh jobs and due
    /// re-checks whenever both are ready.
    ///
    /// Returns `None` on shutdown, or once the input is closed and no
    /// re-check is left.
    async fn next_item(&mut self, shutdown: &CancellationToken) -> Option<Recheck> {
        loop {
            let accepting = self.input_open && !self.rechecks.is_full();
            let has_rechecks = !self.rechecks.is_empty();

            let ready = if self.fresh_first {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return None,
                    received = self.input.recv(), if accepting => Ready::Fresh(received),
                    Some(due) = self.rechecks.next_due(), if has_rechecks => Ready::Due(due),
                    else => return None,
                }
            } else {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return None,
                    Some(due) = self.rechecks.next_due(), if has_rechecks => Ready::Due(due),
                    received = self.input.recv(), if accepting => Ready::Fresh(received),
                    else => return None,
                }
            };

            match ready {
                Ready::Fresh(Some(job)) => {
                    self.fresh_first = false;
                    return Some(Recheck::new(job));
                }
                Ready::Fresh(None) => self.input_open = false,
                Ready::Due(due) => {
                    self.fresh_first = true;
                    return Some(due);
                }
            }
        }
    }

    /// Check one job's status and route it.
    async fn check(&mut self, item: Recheck, shutdown: &CancellationToken) -> Outcome {
        let Recheck { job, failures } = item;

        let snapshot = match self.jobs.job_status(&job).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.on_status_failure(job, failures, &e.to_string());
                return Outcome::Continue;
            }
        };

        match snapshot.status {
            JobStatus::Pending => {
                debug!(job_id = %snapshot.id, subject = %snapshot.subject, "Job still pending, re-check scheduled");
                self.reschedule(Recheck::new(snapshot));
                Outcome::Continue
            }
            JobStatus::Error => {
                warn!(
                    job_id = %snapshot.id,
                    subject = %snapshot.subject,
                    detail = snapshot.detail.as_deref().unwrap_or(""),
                    "Parsing job failed"
                );
                Outcome::Continue
            }
            JobStatus::Done => {
                debug!(job_id = %snapshot.id, "Job done");
                if forward(&self.output, snapshot, shutdown, "poll").await {
                    Outcome::Continue
                } else {
                    Outcome::Stop
                }
            }
        }
    }

    fn on_status_failure(&mut self, job: ParsingJob, failures: u32, reason: &str) {
        match self.policy {
            StatusCheckFailurePolicy::Drop => {
                error!(job_id = %job.id, subject = %job.subject, error = %reason, "Status check failed, dropping job");
            }
            StatusCheckFailurePolicy::Retry { max_retries } => {
                let failures = failures + 1;
                if failures > max_retries {
                    error!(
                        job_id = %job.id,
                        subject = %job.subject,
                        attempts = failures,
                        error = %reason,
                        "Status check failed too many times, dropping job"
                    );
                } else {
                    debug!(job_id = %job.id, attempts = failures, error = %reason, "Status check failed, will retry");
                    self.reschedule(Recheck { job, failures });
                }
            }
        }
    }

    fn reschedule(&mut self, recheck: Recheck) {
        // Items only enter the stage while the queue has room, so this is
        // unreachable unless the job service hands out duplicate ids.
        if let Err(refused) = self.rechecks.schedule(recheck, self.job_interval) {
            error!(job_id = %refused.job.id, "Re-check queue full, dropping job");
        }
    }
}
