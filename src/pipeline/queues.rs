//! Inter-stage queues and the cancellable waits every stage shares.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::model::{Email, ParsingJob};

/// The three queues of the pipeline, before they are handed to the stages.
pub(crate) struct PipelineQueues {
    pub submit_tx: mpsc::Sender<Email>,
    pub submit_rx: mpsc::Receiver<Email>,
    pub poll_tx: mpsc::Sender<ParsingJob>,
    pub poll_rx: mpsc::Receiver<ParsingJob>,
    pub collect_tx: mpsc::Sender<ParsingJob>,
    pub collect_rx: mpsc::Receiver<ParsingJob>,
}

impl PipelineQueues {
    /// Create all queues with the same capacity (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (submit_tx, submit_rx) = mpsc::channel(capacity);
        let (poll_tx, poll_rx) = mpsc::channel(capacity);
        let (collect_tx, collect_rx) = mpsc::channel(capacity);
        Self {
            submit_tx,
            submit_rx,
            poll_tx,
            poll_rx,
            collect_tx,
            collect_rx,
        }
    }
}

/// Push `item` downstream, waiting for room.
///
/// Returns `false` when the stage should stop: either shutdown was signalled
/// while waiting, or the consumer is gone.
pub(crate) async fn forward<T>(
    tx: &mpsc::Sender<T>,
    item: T,
    shutdown: &CancellationToken,
    stage: &'static str,
) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => false,
        sent = tx.send(item) => match sent {
            Ok(()) => true,
            Err(_) => {
                error!(stage, "Downstream queue closed, stopping stage");
                false
            }
        },
    }
}

/// Take the next item from `rx`. `None` on shutdown or when the producer is gone.
pub(crate) async fn receive<T>(
    rx: &mut mpsc::Receiver<T>,
    shutdown: &CancellationToken,
) -> Option<T> {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => None,
        item = rx.recv() => item,
    }
}

/// Sleep for `duration`. Returns `false` if shutdown interrupted the wait.
pub(crate) async fn pause(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
