//! Fetch stage — pulls emails from the source on a fixed cadence.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::backend::EmailSource;
use crate::model::Email;

use super::queues::forward;

const MIN_FETCH_INTERVAL: Duration = Duration::from_millis(1);

pub(crate) struct FetchStage {
    source: Arc<dyn EmailSource>,
    filter: String,
    fetch_interval: Duration,
    output: mpsc::Sender<Email>,
}

impl FetchStage {
    pub fn new(
        source: Arc<dyn EmailSource>,
        filter: String,
        fetch_interval: Duration,
        output: mpsc::Sender<Email>,
    ) -> Self {
        Self {
            source,
            filter,
            fetch_interval,
            output,
        }
    }

    /// Fetch a batch every `fetch_interval`, starting immediately.
    pub async fn run(self, shutdown: CancellationToken) {
        // `interval` rejects a zero period
        let mut ticker = interval(self.fetch_interval.max(MIN_FETCH_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_ms = self.fetch_interval.as_millis() as u64,
            filter = %self.filter,
            "Fetch stage started"
        );

        'cycles: loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let emails = match self.source.fetch(&self.filter).await {
                Ok(emails) => emails,
                Err(e) => {
                    error!(error = %e, "Email fetch failed, waiting for next cycle");
                    continue;
                }
            };

            if emails.is_empty() {
                debug!("No new emails");
                continue;
            }

            debug!(count = emails.len(), "Fetched emails");
            for email in emails {
                if !forward(&self.output, email, &shutdown, "fetch").await {
                    break 'cycles;
                }
            }
        }

        info!("Fetch stage stopped");
    }
}
