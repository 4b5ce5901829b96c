//! Delayed status re-checks for Pending jobs.
//!
//! Owned by the Poll stage. Holds at most one entry per job id and at most
//! `capacity` entries overall; nothing is spawned per job, so dropping the
//! queue drops every outstanding re-check.

use std::collections::HashMap;
use std::future::poll_fn;
use std::time::Duration;

use tokio_util::time::{DelayQueue, delay_queue};

use crate::model::{JobId, ParsingJob};

/// A job waiting for its next status check.
#[derive(Debug, Clone, PartialEq)]
pub struct Recheck {
    /// Latest snapshot of the job.
    pub job: ParsingJob,
    /// Consecutive failed status-check calls so far.
    pub failures: u32,
}

impl Recheck {
    pub fn new(job: ParsingJob) -> Self {
        Self { job, failures: 0 }
    }
}

/// Bounded, keyed delay queue of [`Recheck`]s.
pub struct RecheckQueue {
    delays: DelayQueue<JobId>,
    entries: HashMap<JobId, (delay_queue::Key, Recheck)>,
    capacity: usize,
}

impl RecheckQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            delays: DelayQueue::new(),
            entries: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a re-check is outstanding for `id`.
    pub fn contains(&self, id: &JobId) -> bool {
        self.entries.contains_key(id)
    }

    /// Schedule `recheck` to come due after `delay`.
    ///
    /// An outstanding re-check for the same job id is replaced, snapshot and
    /// deadline alike. A new job id is refused when the queue is full, and the
    /// re-check is handed back.
    pub fn schedule(&mut self, recheck: Recheck, delay: Duration) -> Result<(), Recheck> {
        let id = recheck.job.id.clone();

        if let Some((key, current)) = self.entries.get_mut(&id) {
            self.delays.reset(key, delay);
            *current = recheck;
            return Ok(());
        }

        if self.is_full() {
            return Err(recheck);
        }

        let key = self.delays.insert(id.clone(), delay);
        self.entries.insert(id, (key, recheck));
        Ok(())
    }

    /// Wait for the next re-check to come due and take it out of the queue.
    ///
    /// Returns `None` immediately when the queue is empty.
    pub async fn next_due(&mut self) -> Option<Recheck> {
        loop {
            let expired = poll_fn(|cx| self.delays.poll_expired(cx)).await?;
            if let Some((_, recheck)) = self.entries.remove(expired.get_ref()) {
                return Some(recheck);
            }
        }
    }
}

impl std::fmt::Debug for RecheckQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecheckQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
